use crate::archive::locator::{open_stapled, ArchiveRegion};
use crate::archive::path::base_name;
use crate::error::{Result, StapleError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::debug;

/// Metadata for one entry of the embedded archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Stored archive name; the entry's identifier
    pub path: String,
    /// Final component of `path`
    pub name: String,
    /// Body length in bytes (always 0 for directories)
    pub size: u64,
    pub is_dir: bool,
    pub mode: u32,
    /// Seconds since the Unix epoch
    pub modified_time: u64,
}

/// An entry header together with where its body starts
pub(crate) struct ScannedEntry {
    pub info: EntryInfo,
    /// Offset of the body relative to the start of the archive
    pub data_offset: u64,
}

/// Walk entry headers in archive order until the end of the archive or
/// until `visit` breaks.
pub(crate) fn scan_entries<F>(region: &mut ArchiveRegion, mut visit: F) -> Result<()>
where
    F: FnMut(ScannedEntry) -> ControlFlow<()>,
{
    let mut archive = tar::Archive::new(region.reader());
    let entries = archive.entries().map_err(|e| {
        StapleError::Format(format!("reading tar headers from stapled file: {}", e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            StapleError::Format(format!("reading tar headers from stapled file: {}", e))
        })?;
        let scanned = ScannedEntry {
            info: entry_info(&entry)?,
            data_offset: entry.raw_file_position(),
        };
        if visit(scanned).is_break() {
            break;
        }
    }

    Ok(())
}

fn entry_info<R: Read>(entry: &tar::Entry<'_, R>) -> Result<EntryInfo> {
    let raw = entry.path_bytes();
    let path = std::str::from_utf8(&raw)
        .map_err(|e| StapleError::Format(format!("Invalid UTF-8 in entry name: {}", e)))?
        .trim_end_matches('/')
        .to_string();
    if path.is_empty() {
        return Err(StapleError::Format("Entry with an empty name".to_string()));
    }

    let header = entry.header();
    let is_dir = header.entry_type().is_dir();
    let mode = header
        .mode()
        .map_err(|e| StapleError::Format(format!("Invalid mode for {}: {}", path, e)))?;
    let modified_time = header
        .mtime()
        .map_err(|e| StapleError::Format(format!("Invalid mtime for {}: {}", path, e)))?;

    Ok(EntryInfo {
        name: base_name(&path).to_string(),
        size: if is_dir { 0 } else { entry.size() },
        is_dir,
        mode,
        modified_time,
        path,
    })
}

/// List every entry of a stapled file in archive order.
///
/// An empty `stapled` path reads the running executable.
pub fn list_archive_entries(stapled: &Path) -> Result<Vec<EntryInfo>> {
    let mut region = open_stapled(stapled)?;
    let mut entries = Vec::new();
    scan_entries(&mut region, |entry| {
        entries.push(entry.info);
        ControlFlow::Continue(())
    })?;
    debug!(count = entries.len(), "indexed embedded archive");
    Ok(entries)
}

/// Map every archive name of a stapled file to its metadata.
///
/// When a name appears more than once the first occurrence wins, which is
/// also the entry [`crate::open_archive_entry`] returns.
pub fn list_archive_flat(stapled: &Path) -> Result<BTreeMap<String, EntryInfo>> {
    let mut flat = BTreeMap::new();
    for entry in list_archive_entries(stapled)? {
        flat.entry(entry.path.clone()).or_insert(entry);
    }
    Ok(flat)
}
