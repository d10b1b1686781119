#![no_main]

use binstapler::{build_tree, list_archive_flat, open_archive_entry};
use libfuzzer_sys::fuzz_target;
use std::io::{Read, Write};
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    // Write fuzz data to temporary file
    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if temp_file.write_all(data).is_err() || temp_file.flush().is_err() {
        return;
    }
    let path = temp_file.path();

    // Indexing must fail cleanly on garbage, never panic
    let flat = match list_archive_flat(path) {
        Ok(flat) => flat,
        Err(_) => return,
    };
    let _tree = build_tree(&flat);

    for name in flat.keys().take(32) {
        if let Ok(mut reader) = open_archive_entry(path, name) {
            let mut sink = Vec::new();
            let _ = reader.by_ref().take(1 << 20).read_to_end(&mut sink);
        }
    }

    let _ = open_archive_entry(path, "");
    let _ = open_archive_entry(path, "../../../etc/passwd");
});
