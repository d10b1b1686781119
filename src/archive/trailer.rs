use crate::error::{Result, StapleError};
use std::io::Write;

/// Width of the size trailer in bytes (fits any u64 in decimal)
pub const TRAILER_LEN: usize = 20;

/// Size trailer
///
/// Located at the very end of a stapled file (last 20 bytes).
/// Holds the length of the original binary as zero-padded ASCII decimal,
/// which is also the absolute offset of the embedded archive.
///
/// Structure (20 bytes fixed):
/// - Binary length: ASCII digits `0-9`, left-padded with `0`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub binary_len: u64,
}

impl Trailer {
    pub fn new(binary_len: u64) -> Self {
        Self { binary_len }
    }

    /// Encoded trailer bytes
    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        let mut buf = [0u8; TRAILER_LEN];
        buf.copy_from_slice(format!("{:020}", self.binary_len).as_bytes());
        buf
    }

    /// Write trailer to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<usize> {
        writer.write_all(&self.to_bytes())?;
        Ok(TRAILER_LEN)
    }

    /// Parse trailer bytes
    pub fn from_bytes(buf: &[u8; TRAILER_LEN]) -> Result<Self> {
        // u64::from_str would also accept a leading '+'
        if let Some(pos) = buf.iter().position(|b| !b.is_ascii_digit()) {
            return Err(StapleError::Format(format!(
                "Size trailer has a non-digit byte 0x{:02x} at position {}",
                buf[pos], pos
            )));
        }

        // All bytes are ASCII digits, so the slice is valid UTF-8
        let digits = std::str::from_utf8(buf)
            .map_err(|e| StapleError::Format(format!("Size trailer is not ASCII: {}", e)))?;
        let binary_len = digits.parse::<u64>().map_err(|e| {
            StapleError::Format(format!("Size trailer {:?} is out of range: {}", digits, e))
        })?;

        Ok(Self { binary_len })
    }
}
