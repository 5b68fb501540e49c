use std::io;
use std::path::Path;

/// Errors surfaced by file-tools operations, classified by what happened.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or contradictory request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Named path or glob yields no entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Archive extension or format name outside the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Source opened but a read failed
    #[error("Not readable: {0}")]
    NotReadable(String),

    /// Destination could not be created or written
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Cooperative cancellation observed before completion
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies a failure to open or read `path`.
    pub fn read(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::NotReadable(format!("{}: {}", path.display(), err))
        }
    }

    /// Classifies a failure to create or write `path`.
    pub fn write(path: &Path, err: io::Error) -> Self {
        Error::WriteFailed(format!("{}: {}", path.display(), err))
    }

    /// Stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::NotReadable(_) => "not_readable",
            Error::WriteFailed(_) => "write_failed",
            Error::Cancelled => "cancelled",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 2,
            Error::NotFound(_) => 3,
            Error::UnsupportedFormat(_) => 4,
            Error::NotReadable(_) => 5,
            Error::WriteFailed(_) => 6,
            Error::Cancelled => 130,
        }
    }
}
