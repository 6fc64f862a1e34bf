use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Supported image extensions for files found while scanning directories.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "webp", "avif",
    // RAW formats
    "cr3", "cr2", "crw", "dng", "nef", "nrw", "arw", "sr2", "raf", "orf", "rw2", "pef", "srw",
    "3fr", "iiq", "x3f",
];

/// Suffix exiftool appends to the backup it keeps of a file it rewrote.
const BACKUP_SUFFIX: &str = "_original";

/// Standard camera folder names inside `DCIM`, e.g. `100CANON`, `101_FUJI`.
static DCIM_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}\w{5}$").expect("valid DCIM pattern"));

/// Expand user-supplied paths into a flat, de-duplicated list of image files.
///
/// Files are taken as given. A directory containing a `DCIM` subdirectory is
/// treated as a memory card and only its camera folders are scanned; any other
/// directory has its non-hidden children scanned recursively. Inside
/// directories, only supported image files are kept and exiftool `_original`
/// backups are skipped.
///
/// # Example
///
/// ```rust,no_run
/// use geolocator::collector::collect;
/// use std::path::PathBuf;
///
/// let files = collect(&[PathBuf::from("/Volumes/EOS_DIGITAL")])?;
/// println!("Found {} images", files.len());
/// # Ok::<(), geolocator::error::Error>(())
/// ```
pub fn collect(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        let path = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
        let metadata = std::fs::metadata(&path).map_err(|e| Error::io(&path, e))?;

        let mut found = Vec::new();
        if metadata.is_dir() {
            collect_dir(&path, &mut found)?;
        } else {
            log::debug!("{} is a file", path.display());
            found.push(path);
        }

        for file in found {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    Ok(files)
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if let Some(folders) = dcim_folders(dir)? {
        log::info!("Opening {} as a memory card", dir.display());
        for folder in folders {
            collect_dir(&folder, files)?;
        }
        return Ok(());
    }

    for child in children(dir)? {
        if child.is_dir() {
            collect_dir(&child, files)?;
        } else if is_candidate(&child) {
            files.push(child);
        } else {
            log::debug!("Skipping {}", child.display());
        }
    }

    Ok(())
}

/// The camera folders of `dir/DCIM`, or `None` when `dir` has no `DCIM` directory.
fn dcim_folders(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let dcim = dir.join("DCIM");
    if !dcim.is_dir() {
        return Ok(None);
    }

    let folders = children(&dcim)?
        .into_iter()
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| DCIM_FOLDER.is_match(n))
        })
        .collect();
    Ok(Some(folders))
}

/// Immediate, non-hidden children of `dir`, sorted by name.
fn children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        if is_hidden(entry.path()) {
            continue;
        }
        entries.push(entry.into_path());
    }
    Ok(entries)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Check if a file found inside a directory should be loaded.
fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with(BACKUP_SUFFIX) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
