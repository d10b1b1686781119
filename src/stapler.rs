use crate::archive::{build_archive, build_archive_in, Trailer, TRAILER_LEN};
use crate::config::StapleConfig;
use crate::error::{IoResultExt, Result, StapleError, StapleStage};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use tracing::info;

/// Sizes recorded while stapling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StapleSummary {
    /// Bytes copied from the original binary; also the trailer value
    pub binary_len: u64,
    /// Bytes of embedded archive, headers and padding included
    pub archive_len: u64,
    /// Bytes of file bodies inside the archive
    pub content_len: u64,
    /// Size of the stapled file
    pub total_len: u64,
}

/// Counts bytes passing through to the inner writer
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Create `config.output` as the binary followed by an archive of
/// `config.paths` and the size trailer.
///
/// Never overwrites an existing output. A failure after the output was
/// created leaves the partial file on disk; the caller should discard it.
pub fn staple_files(config: &StapleConfig) -> Result<StapleSummary> {
    config.validate()?;

    let mut binary = File::open(&config.binary)
        .access(|| format!("cannot read source binary file {}", config.binary.display()))?;

    let target = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&config.output)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StapleError::Conflict(config.output.clone()),
            _ => StapleError::access(format!("creating {}", config.output.display()), e)
                .in_stage(StapleStage::CreateTarget),
        })?;
    copy_permissions(&binary, &target)
        .map_err(|e| e.in_stage(StapleStage::CreateTarget))?;

    let mut writer = BufWriter::new(target);

    let binary_len = io::copy(&mut binary, &mut writer)
        .access(|| format!("copying {}", config.binary.display()))
        .map_err(|e| e.in_stage(StapleStage::CopyBinary))?;

    let mut counter = CountingWriter {
        inner: &mut writer,
        count: 0,
    };
    let built = match &config.base_dir {
        Some(base) => build_archive_in(base, &config.paths, &mut counter),
        None => build_archive(&config.paths, &mut counter),
    };
    let content_len = built.map_err(|e| e.in_stage(StapleStage::BuildArchive))?;
    let archive_len = counter.count;

    Trailer::new(binary_len)
        .write_to(&mut writer)
        .and_then(|_| writer.flush())
        .access(|| format!("writing into {}", config.output.display()))
        .map_err(|e| e.in_stage(StapleStage::WriteTrailer))?;

    let summary = StapleSummary {
        binary_len,
        archive_len,
        content_len,
        total_len: binary_len + archive_len + TRAILER_LEN as u64,
    };
    info!(
        output = %config.output.display(),
        binary_len,
        archive_len,
        content_len,
        "stapled files onto binary"
    );
    Ok(summary)
}

#[cfg(unix)]
fn copy_permissions(source: &File, target: &File) -> Result<()> {
    let permissions = source
        .metadata()
        .access(|| "reading the binary permissions")?
        .permissions();
    target
        .set_permissions(permissions)
        .access(|| "setting the target permissions")
}

#[cfg(not(unix))]
fn copy_permissions(_source: &File, _target: &File) -> Result<()> {
    Ok(())
}
