use std::collections::HashSet;
use std::path::PathBuf;

use super::accessor::{Metadata, tags};
use crate::record::ImageRecord;

/// Decode the grouped JSON array printed by the extraction tool into records.
///
/// Malformed JSON fails the whole batch. Individual entries the tool could not
/// read (an `ExifTool:Error` value, or no `SourceFile`) are logged and dropped,
/// as are requested files that do not appear in the output at all.
pub fn decode(stdout: &[u8], requested: &[PathBuf]) -> Result<Vec<ImageRecord>, serde_json::Error> {
    let entries: Vec<serde_json::Value> = if stdout.iter().all(u8::is_ascii_whitespace) {
        Vec::new()
    } else {
        serde_json::from_slice(stdout)?
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for entry in &entries {
        let Some(object) = entry.as_object() else {
            log::warn!("Skipping non-object metadata entry");
            continue;
        };
        let Some(source) = object.get("SourceFile").and_then(|v| v.as_str()) else {
            log::warn!("Skipping metadata entry without SourceFile");
            continue;
        };
        let path = PathBuf::from(source);
        seen.insert(path.clone());

        let metadata = Metadata::from_json(object);
        if let Some(error) = metadata.string(tags::TOOL_ERROR) {
            log::error!("Failed to read metadata from {}: {error}", path.display());
            continue;
        }

        records.push(ImageRecord::from_metadata(path, &metadata));
    }

    for path in requested.iter().filter(|p| !seen.contains(*p)) {
        log::error!("No metadata returned for {}", path.display());
    }

    Ok(records)
}
