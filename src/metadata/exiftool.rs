use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::accessor::{Metadata, TagKey};
use crate::error::ToolError;

/// Captured output of one external tool run that exited usefully.
#[derive(Debug, Default, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    /// Lines the tool printed to stderr (warnings and per-file errors).
    pub diagnostics: Vec<String>,
}

impl ToolOutput {
    /// Per-file `Error:` lines; exiftool keeps going after these.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with("Error"))
    }
}

/// The external metadata reader/writer.
///
/// [`ExifTool`] is the real implementation; the trait exists so the store can
/// be driven by something else (a different tool, or an in-memory fake).
#[async_trait::async_trait]
pub trait MetadataTool: Send + Sync {
    /// Display name used in log messages.
    fn name(&self) -> &str;

    /// Extract grouped metadata for `files` in one invocation and return the raw
    /// JSON array the tool printed. `tags` limits the output when given.
    async fn extract(&self, files: &[PathBuf], tags: Option<&[TagKey]>) -> Result<ToolOutput, ToolError>;

    /// The command line [`update`](MetadataTool::update) would run, for dry-run logs.
    fn update_command(&self, file: &Path, edits: &Metadata) -> String;

    /// Write `edits` into a single file.
    async fn update(&self, file: &Path, edits: &Metadata) -> Result<ToolOutput, ToolError>;

    /// Apply a staged JSON batch (`SourceFile` plus `Group:Tag` keys) to `files`.
    async fn import(&self, staged: &Path, files: &[PathBuf]) -> Result<ToolOutput, ToolError>;
}

/// Runs Phil Harvey's `exiftool` as a child process.
pub struct ExifTool {
    program: PathBuf,
    keep_backups: bool,
}

impl ExifTool {
    /// `program` is looked up on `PATH` when it is a bare name.
    ///
    /// With `keep_backups`, exiftool leaves a `<name>_original` copy next to each
    /// file it rewrites; otherwise it overwrites in place.
    pub fn new(program: impl Into<PathBuf>, keep_backups: bool) -> Self {
        Self {
            program: program.into(),
            keep_backups,
        }
    }

    async fn run(&self, args: &[String], allow_partial: bool) -> Result<ToolOutput, ToolError> {
        log::debug!("{} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostics: Vec<String> = stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        if !output.status.success() {
            let partial = allow_partial && !output.stdout.iter().all(u8::is_ascii_whitespace);
            if !partial {
                return Err(ToolError::Exit {
                    code: output.status.code().unwrap_or(-1),
                    stderr: diagnostics.join("; "),
                });
            }
            log::warn!(
                "{} exited with {} but produced output",
                self.program.display(),
                output.status
            );
        }

        for line in &diagnostics {
            log::warn!("{line}");
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            diagnostics,
        })
    }
}

#[async_trait::async_trait]
impl MetadataTool for ExifTool {
    fn name(&self) -> &str {
        "exiftool"
    }

    async fn extract(&self, files: &[PathBuf], tags: Option<&[TagKey]>) -> Result<ToolOutput, ToolError> {
        let argfile = write_argfile(files)?;
        let args = read_args(tags, argfile.path());
        self.run(&args, true).await
    }

    fn update_command(&self, file: &Path, edits: &Metadata) -> String {
        let args = write_args(file, edits, self.keep_backups);
        format!("{} {}", self.program.display(), args.join(" "))
    }

    async fn update(&self, file: &Path, edits: &Metadata) -> Result<ToolOutput, ToolError> {
        let args = write_args(file, edits, self.keep_backups);
        self.run(&args, false).await
    }

    async fn import(&self, staged: &Path, files: &[PathBuf]) -> Result<ToolOutput, ToolError> {
        let argfile = write_argfile(files)?;
        let args = import_args(staged, argfile.path(), self.keep_backups);
        // Exits nonzero when any single file fails; the rest are still written.
        self.run(&args, true).await.or_else(|e| match e {
            ToolError::Exit { stderr, .. } => Ok(ToolOutput {
                stdout: Vec::new(),
                diagnostics: stderr
                    .split("; ")
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect(),
            }),
            other => Err(other),
        })
    }
}

/// Arguments for a grouped, numeric JSON read of the files listed in `argfile`.
pub fn read_args(tags: Option<&[TagKey]>, argfile: &Path) -> Vec<String> {
    let mut args = vec!["-json".to_string(), "-g".to_string(), "-n".to_string()];
    if let Some(tags) = tags {
        args.extend(tags.iter().map(|t| format!("-{t}")));
    }
    args.push("-@".to_string());
    args.push(argfile.display().to_string());
    args
}

/// Arguments that write `edits` into `file`. Only tags present in `edits` appear.
pub fn write_args(file: &Path, edits: &Metadata, keep_backups: bool) -> Vec<String> {
    let mut args = common_write_args(keep_backups);
    args.extend(edits.entries().map(|(tag, value)| format!("-{tag}={value}")));
    args.push(file.display().to_string());
    args
}

/// Arguments that import a staged JSON batch into the files listed in `argfile`.
pub fn import_args(staged: &Path, argfile: &Path, keep_backups: bool) -> Vec<String> {
    let mut args = vec![format!("-json={}", staged.display())];
    args.extend(common_write_args(keep_backups));
    args.push("-@".to_string());
    args.push(argfile.display().to_string());
    args
}

fn common_write_args(keep_backups: bool) -> Vec<String> {
    let mut args = vec!["-m".to_string(), "-codedcharacterset=utf8".to_string()];
    if !keep_backups {
        args.push("-overwrite_original_in_place".to_string());
    }
    args
}

/// Write one path per line for exiftool's `-@` option.
fn write_argfile(files: &[PathBuf]) -> Result<NamedTempFile, ToolError> {
    let mut argfile = tempfile::Builder::new()
        .prefix("geolocator-args-")
        .suffix(".txt")
        .tempfile()
        .map_err(ToolError::Staging)?;
    for file in files {
        writeln!(argfile, "{}", file.display()).map_err(ToolError::Staging)?;
    }
    argfile.flush().map_err(ToolError::Staging)?;
    Ok(argfile)
}
