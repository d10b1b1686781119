use crate::archive::index::{scan_entries, ScannedEntry};
use crate::archive::locator::open_stapled;
use crate::error::{IoResultExt, Result, StapleError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Take};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::debug;

/// Streaming handle over one archive entry's body.
///
/// Owns the descriptor it was opened with; reads end at the entry's
/// declared size. Each handle comes from a fresh scan, so it cannot be
/// pointed at another entry.
#[derive(Debug)]
pub struct EntryReader {
    inner: Take<File>,
    path: String,
    size: u64,
}

impl EntryReader {
    /// Archive name of the entry
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared body length
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Release the underlying descriptor
    pub fn close(self) {
        drop(self.inner);
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Open the entry named exactly `entry_path` inside a stapled file.
///
/// An empty `stapled` path reads the running executable. Names are compared
/// byte for byte with the stored archive names; no normalization is applied.
pub fn open_archive_entry(stapled: &Path, entry_path: &str) -> Result<EntryReader> {
    let mut region = open_stapled(stapled)?;

    let mut found: Option<ScannedEntry> = None;
    scan_entries(&mut region, |entry| {
        if entry.info.path == entry_path {
            found = Some(entry);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    // region is dropped on this path, closing the file
    let Some(entry) = found else {
        return Err(StapleError::NotFound(entry_path.to_string()));
    };

    let start = region.offset() + entry.data_offset;
    // A body declared past the archive boundary is cut off there
    let available = region.len().saturating_sub(entry.data_offset);
    let mut file = region.into_file();
    file.seek(SeekFrom::Start(start))
        .access(|| format!("seeking to the contents of {}", entry_path))?;
    debug!(entry = entry_path, offset = start, size = entry.info.size, "opened archive entry");

    Ok(EntryReader {
        inner: file.take(entry.info.size.min(available)),
        path: entry.info.path,
        size: entry.info.size,
    })
}

/// Copy one entry of a stapled file to `dest`, which must not exist yet.
///
/// Returns the number of bytes written.
pub fn extract_entry(stapled: &Path, entry_path: &str, dest: &Path) -> Result<u64> {
    let mut reader = open_archive_entry(stapled, entry_path)?;

    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StapleError::Conflict(dest.to_path_buf()),
            _ => StapleError::access(format!("creating {}", dest.display()), e),
        })?;

    let copied = io::copy(&mut reader, &mut out)
        .access(|| format!("extracting {} to {}", entry_path, dest.display()))?;
    if copied != reader.size() {
        return Err(StapleError::Format(format!(
            "Entry {} is truncated: expected {} bytes, found {}",
            entry_path,
            reader.size(),
            copied
        )));
    }

    reader.close();
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::trailer::Trailer;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn stapled_with(entries: &[(&str, &[u8])]) -> NamedTempFile {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            for (name, data) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                builder.append_data(&mut header, name, *data).unwrap();
            }
            builder.finish().unwrap();
        }

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"MZ-binary").unwrap();
        temp.write_all(&tar_bytes).unwrap();
        temp.write_all(&Trailer::new(9).to_bytes()).unwrap();
        temp.flush().unwrap();
        temp
    }

    #[test]
    fn test_reads_are_confined_to_entry() {
        let temp = stapled_with(&[("one.txt", b"first body"), ("two.txt", b"second")]);

        let mut reader = open_archive_entry(temp.path(), "one.txt").unwrap();
        assert_eq!(reader.size(), 10);
        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"first body");

        // Further reads hit end-of-stream instead of the next header
        let mut more = [0u8; 16];
        assert_eq!(reader.read(&mut more).unwrap(), 0);
        reader.close();
    }

    #[test]
    fn test_exact_name_match_only() {
        let temp = stapled_with(&[("dir/file.txt", b"x")]);
        for wrong in ["./dir/file.txt", "/dir/file.txt", "dir", "file.txt"] {
            let err = open_archive_entry(temp.path(), wrong).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "{}", wrong);
        }
    }

    #[test]
    fn test_first_duplicate_is_returned() {
        let temp = stapled_with(&[("dup", b"first"), ("dup", b"second")]);
        let mut body = String::new();
        open_archive_entry(temp.path(), "dup")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "first");
    }

    #[test]
    fn test_extract_entry() {
        let temp = stapled_with(&[("data.bin", &[1, 2, 3, 4])]);
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        assert_eq!(extract_entry(temp.path(), "data.bin", &dest).unwrap(), 4);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1, 2, 3, 4]);

        let err = extract_entry(temp.path(), "data.bin", &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
