use crate::archive::trailer::{Trailer, TRAILER_LEN};
use crate::error::{IoResultExt, Result, StapleError};
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Take};
use std::path::Path;
use tracing::debug;

/// Open stapled file positioned at its embedded archive.
///
/// Owns the descriptor; dropping the region closes the file.
#[derive(Debug)]
pub struct ArchiveRegion {
    file: File,
    offset: u64,
    len: u64,
}

impl ArchiveRegion {
    /// Absolute offset of the first archive byte (the original binary length)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the embedded archive, trailer excluded
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequential reader over the archive bytes only.
    ///
    /// Reads stop at the trailer even if the archive lacks its terminator.
    pub fn reader(&mut self) -> Take<&mut File> {
        (&mut self.file).take(self.len)
    }

    pub(crate) fn into_file(self) -> File {
        self.file
    }
}

/// Resolve the stapled file to open; an empty path means the running executable
pub fn resolve_stapled_path(path: &Path) -> Result<Cow<'_, Path>> {
    if !path.as_os_str().is_empty() {
        return Ok(Cow::Borrowed(path));
    }
    let exe = std::env::current_exe().access(|| "determining the binary path")?;
    Ok(Cow::Owned(exe))
}

/// Open a stapled file and seek to its embedded archive
pub fn open_stapled(path: &Path) -> Result<ArchiveRegion> {
    let path = resolve_stapled_path(path)?;
    let file = File::open(&path)
        .access(|| format!("opening {} to read stapled files", path.display()))?;
    locate_archive(file)
}

/// Read the size trailer and position `file` at the start of the archive.
///
/// Does not check that a well-formed archive follows; the first consumer
/// discovers that.
pub fn locate_archive(mut file: File) -> Result<ArchiveRegion> {
    let total_len = file.metadata().access(|| "getting file info")?.len();
    if total_len < TRAILER_LEN as u64 {
        return Err(StapleError::Format(format!(
            "File is {} bytes, too small to hold a {}-byte size trailer",
            total_len, TRAILER_LEN
        )));
    }

    let trailer_start = total_len - TRAILER_LEN as u64;
    file.seek(SeekFrom::Start(trailer_start))
        .access(|| "seeking to the size trailer")?;
    let mut buf = [0u8; TRAILER_LEN];
    file.read_exact(&mut buf)
        .access(|| "reading the binary size string")?;
    let trailer = Trailer::from_bytes(&buf)?;

    if trailer.binary_len > trailer_start {
        return Err(StapleError::Format(format!(
            "Size trailer points at offset {} past the end of the archive region ({})",
            trailer.binary_len, trailer_start
        )));
    }

    file.seek(SeekFrom::Start(trailer.binary_len))
        .access(|| "seeking to the archive boundary")?;
    debug!(
        offset = trailer.binary_len,
        archive_len = trailer_start - trailer.binary_len,
        "located embedded archive"
    );

    Ok(ArchiveRegion {
        file,
        offset: trailer.binary_len,
        len: trailer_start - trailer.binary_len,
    })
}
