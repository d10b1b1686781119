use crate::error::{Result, StapleError};
use std::path::Path;

/// Canonical archive name for a host path as given by the caller.
///
/// Separators become `/` (on Windows `\` is one too), empty and `.`
/// components are dropped, and a leading root is stripped so every stored
/// name is relative. `..` is rejected because it cannot be represented
/// inside the archive.
pub fn archive_name(path: &Path) -> Result<String> {
    let raw = path.to_str().ok_or_else(|| {
        StapleError::InvalidInput(format!("Path is not valid UTF-8: {}", path.display()))
    })?;
    normalize_name(raw)
}

#[cfg(windows)]
const SEPARATORS: &[char] = &['/', '\\'];
#[cfg(not(windows))]
const SEPARATORS: &[char] = &['/'];

/// Canonicalize a separated name; `\` only separates on Windows, where
/// directory expansion splits on it too
pub fn normalize_name(raw: &str) -> Result<String> {
    let mut parts = Vec::new();
    for part in raw.split(SEPARATORS) {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(StapleError::InvalidInput(format!(
                    "Parent directory components are not allowed in archive names: {}",
                    raw
                )))
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(StapleError::InvalidInput(format!(
            "Path has no nameable components: {:?}",
            raw
        )));
    }

    Ok(parts.join("/"))
}

/// Name of a child entry under an already-canonical parent name
pub fn child_name(parent: &str, child: &str) -> String {
    format!("{}/{}", parent, child)
}

/// Final component of an archive name
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
