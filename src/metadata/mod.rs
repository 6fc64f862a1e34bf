//! Image metadata: the typed accessor, the external tool seam, and the
//! [`MetadataStore`] that owns a batch of [`ImageRecord`]s.
//!
//! - [`Metadata`]: `(group, tag)` lookups with lenient typed getters
//! - [`MetadataTool`] / [`ExifTool`]: batch extraction and write-back via exiftool
//! - [`MetadataStore`]: read a batch, hold it, write edited place fields back

mod accessor;
mod exiftool;
mod reader;
mod writer;

pub use accessor::{EXIF_DATE_FORMAT, Metadata, TagKey, Value, tags};
pub use exiftool::{ExifTool, MetadataTool, ToolOutput, import_args, read_args, write_args};
pub use writer::WriteSummary;

use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::record::ImageRecord;

/// Holds the working set of image records and moves it between files and memory.
///
/// # Example
///
/// ```rust,no_run
/// use geolocator::metadata::{ExifTool, MetadataStore, tags};
/// use std::path::PathBuf;
///
/// # async fn example() -> geolocator::error::Result<()> {
/// let mut store = MetadataStore::new(Box::new(ExifTool::new("exiftool", true)));
/// store.read(Some(&[tags::GPS_STATUS, tags::CITY][..]), &[PathBuf::from("img1.jpg")]).await?;
/// for image in store.images() {
///     println!("{}: {:?}", image.file_name(), image.place.city);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MetadataStore {
    tool: Box<dyn MetadataTool>,
    images: Vec<ImageRecord>,
    dry_run: bool,
}

impl MetadataStore {
    pub fn new(tool: Box<dyn MetadataTool>) -> Self {
        Self {
            tool,
            images: Vec::new(),
            dry_run: false,
        }
    }

    /// In a dry run, writes log what they would do and leave files untouched.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut [ImageRecord] {
        &mut self.images
    }

    /// Read metadata for `files` in a single tool invocation and replace the working set.
    ///
    /// Files the tool cannot read are logged and left out. On error the previous
    /// working set is kept as it was.
    pub async fn read(&mut self, tags: Option<&[TagKey]>, files: &[PathBuf]) -> Result<usize> {
        let images = if files.is_empty() {
            Vec::new()
        } else {
            log::info!("Reading metadata for {} file(s) with {}", files.len(), self.tool.name());
            let output = self.tool.extract(files, tags).await?;
            reader::decode(&output.stdout, files)?
        };

        log::info!("Loaded {} of {} image(s)", images.len(), files.len());
        self.images = images;
        Ok(self.images.len())
    }

    /// Write place fields back one file at a time.
    ///
    /// A failure on one file is logged and the batch continues; only a tool
    /// that cannot be launched at all aborts the write.
    pub async fn write(&self, records: &[ImageRecord]) -> Result<WriteSummary> {
        let (writes, skipped) = writer::pending(records);
        let mut summary = WriteSummary {
            skipped,
            ..Default::default()
        };

        for write in &writes {
            let name = write.record.file_name();
            if self.dry_run {
                log::info!(
                    "DRY RUN: would run {}",
                    self.tool.update_command(&write.record.path, &write.edits)
                );
                summary.written += 1;
                continue;
            }

            match self.tool.update(&write.record.path, &write.edits).await {
                Ok(_) => {
                    log::info!("Wrote location for {name}");
                    summary.written += 1;
                }
                Err(e) if e.is_launch_failure() => return Err(e.into()),
                Err(e) => {
                    log::error!("Failed to write {name}: {e}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Stage every pending edit into one JSON file and apply it in a single invocation.
    pub async fn write_staged(&self, records: &[ImageRecord]) -> Result<WriteSummary> {
        let (writes, skipped) = writer::pending(records);
        let mut summary = WriteSummary {
            skipped,
            ..Default::default()
        };
        if writes.is_empty() {
            log::info!("Nothing to write");
            return Ok(summary);
        }

        let batch = writer::stage(&writes);
        if self.dry_run {
            log::info!("DRY RUN: would import {} edit(s)", writes.len());
            log::debug!("{batch:#}");
            summary.written = writes.len();
            return Ok(summary);
        }

        let mut staged = tempfile::Builder::new()
            .prefix("geolocator-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        serde_json::to_writer_pretty(&mut staged, &batch)?;
        staged.flush().map_err(|e| Error::io(staged.path(), e))?;
        log::debug!("Staged {} edit(s) in {}", writes.len(), staged.path().display());

        let output = self
            .tool
            .import(staged.path(), &writer::files(&writes))
            .await?;

        for line in output.errors() {
            log::error!("{line}");
        }
        summary.failed = output.errors().count().min(writes.len());
        summary.written = writes.len() - summary.failed;
        log::info!("Wrote location for {} image(s)", summary.written);
        Ok(summary)
    }
}
