use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stapling operations
pub type Result<T> = std::result::Result<T, StapleError>;

/// Unified error type for all stapling operations
#[derive(Debug, Error)]
pub enum StapleError {
    /// stat/open/read/write failure on a host path
    #[error("{context}: {source}")]
    Access {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Unparsable trailer or malformed archive header
    #[error("Invalid stapled file: {0}")]
    Format(String),

    #[error("Entry not found in archive: {0}")]
    NotFound(String),

    #[error("Target already exists, refusing to overwrite: {}", .0.display())]
    Conflict(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stapling stage failed; `source` carries the underlying error
    #[error("{stage}: {source}")]
    Stage {
        stage: StapleStage,
        #[source]
        source: Box<StapleError>,
    },
}

/// Flat classification of a [`StapleError`], independent of stage wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Access,
    Format,
    NotFound,
    Conflict,
    InvalidInput,
}

/// Stages of [`crate::staple_files`], named in errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StapleStage {
    CreateTarget,
    CopyBinary,
    BuildArchive,
    WriteTrailer,
}

impl fmt::Display for StapleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            StapleStage::CreateTarget => "creating the target file",
            StapleStage::CopyBinary => "copying the binary into the target",
            StapleStage::BuildArchive => "writing files into the stapled binary",
            StapleStage::WriteTrailer => "writing the size trailer",
        };
        f.write_str(stage)
    }
}

impl StapleError {
    /// Build an access error from an io error and a description of the failed operation
    pub fn access(context: impl Into<String>, source: io::Error) -> Self {
        StapleError::Access {
            context: context.into(),
            source,
        }
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StapleError::Access { .. } => ErrorKind::Access,
            StapleError::Format(_) => ErrorKind::Format,
            StapleError::NotFound(_) => ErrorKind::NotFound,
            StapleError::Conflict(_) => ErrorKind::Conflict,
            StapleError::InvalidInput(_) => ErrorKind::InvalidInput,
            StapleError::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage the error was raised in, if it came out of the stapler
    pub fn stage(&self) -> Option<StapleStage> {
        match self {
            StapleError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn in_stage(self, stage: StapleStage) -> Self {
        StapleError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

/// Attach operation context to raw io results
pub(crate) trait IoResultExt<T> {
    fn access<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn access<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| StapleError::access(context(), source))
    }
}
