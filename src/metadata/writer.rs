use serde::Serialize;
use std::path::PathBuf;

use super::accessor::Metadata;
use crate::record::ImageRecord;

/// Outcome of a batch write.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Files updated (or that would be updated, in a dry run).
    pub written: usize,
    /// Records without an active GPS fix or without any place to store.
    pub skipped: usize,
    /// Files the tool reported an error for.
    pub failed: usize,
}

/// One file's pending edits.
pub struct PendingWrite<'a> {
    pub record: &'a ImageRecord,
    pub edits: Metadata,
}

/// Select the records that should be written.
///
/// Only records with an active GPS fix and at least one non-empty place field
/// qualify; unresolved or void locations are never written.
pub fn pending(records: &[ImageRecord]) -> (Vec<PendingWrite<'_>>, usize) {
    let mut writes = Vec::new();
    let mut skipped = 0;

    for record in records {
        if !record.is_active() {
            log::debug!("GPS status is not active, skipping write for {}", record.file_name());
            skipped += 1;
            continue;
        }
        let edits = record.place.to_metadata();
        if edits.is_empty() {
            log::debug!("No location to write for {}", record.file_name());
            skipped += 1;
            continue;
        }
        writes.push(PendingWrite { record, edits });
    }

    (writes, skipped)
}

/// Serialize pending edits as a JSON batch exiftool can import with `-json=`.
pub fn stage(writes: &[PendingWrite<'_>]) -> serde_json::Value {
    let entries = writes
        .iter()
        .map(|w| {
            let mut entry = serde_json::Map::new();
            entry.insert(
                "SourceFile".to_string(),
                serde_json::Value::String(w.record.path.display().to_string()),
            );
            entry.extend(w.edits.to_flat_json());
            serde_json::Value::Object(entry)
        })
        .collect();
    serde_json::Value::Array(entries)
}

pub fn files(writes: &[PendingWrite<'_>]) -> Vec<PathBuf> {
    writes.iter().map(|w| w.record.path.clone()).collect()
}
