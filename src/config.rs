//! Stapling configuration
//!
//! A [`StapleConfig`] is built once by the caller (the CLI, a build script,
//! a test) and passed by reference into [`crate::staple_files`]. It can also
//! be read from a TOML file:
//!
//! ```toml
//! binary = "target/release/server"
//! output = "dist/server"
//! paths = ["assets", "templates/index.html"]
//! # optional: read relative paths from here, keeping their names
//! base_dir = "web"
//! ```

use crate::error::{IoResultExt, Result, StapleError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StapleConfig {
    /// Executable whose bytes lead the stapled file
    pub binary: PathBuf,
    /// Stapled file to create; must not exist
    pub output: PathBuf,
    /// Files and directories to embed, in order
    pub paths: Vec<PathBuf>,
    /// Directory relative `paths` are read from; archive names stay as given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl StapleConfig {
    pub fn new<B, O, I, P>(binary: B, output: O, paths: I) -> Self
    where
        B: Into<PathBuf>,
        O: Into<PathBuf>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            binary: binary.into(),
            output: output.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Where `path` is read from on the host
    pub fn source_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| StapleError::InvalidInput(format!("Invalid staple config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .access(|| format!("reading staple config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| StapleError::InvalidInput(format!("Cannot serialize staple config: {}", e)))
    }

    /// Check the preconditions for stapling without touching the output.
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(StapleError::InvalidInput(
                "there is nothing to staple to the binary".to_string(),
            ));
        }

        let binary = fs::metadata(&self.binary)
            .access(|| format!("performing stat in the binary {}", self.binary.display()))?;
        if binary.is_dir() {
            return Err(StapleError::InvalidInput(format!(
                "the binary {} is a directory",
                self.binary.display()
            )));
        }

        // symlink_metadata so a dangling link still counts as present
        if fs::symlink_metadata(&self.output).is_ok() {
            return Err(StapleError::Conflict(self.output.clone()));
        }

        let output = output_location(&self.output);
        for path in &self.paths {
            let source = self.source_path(path);
            let metadata = fs::metadata(&source).access(|| {
                format!("performing stat in staple path {}", source.display())
            })?;

            let (true, Some(output)) = (metadata.is_dir(), &output) else {
                continue;
            };
            if let Ok(dir) = fs::canonicalize(&source) {
                if output.starts_with(&dir) {
                    return Err(StapleError::InvalidInput(format!(
                        "the target {} is inside the stapled directory {}",
                        self.output.display(),
                        source.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Absolute path the output will be created at, if its folder exists
fn output_location(output: &Path) -> Option<PathBuf> {
    let name = output.file_name()?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).ok().map(|parent| parent.join(name))
}
