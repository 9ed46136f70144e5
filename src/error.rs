use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while creating, listing or extracting an archive.
#[derive(Debug, Error)]
pub enum SqzipError {
    /// Malformed header, table record or data region.
    #[error("invalid archive: {0}")]
    Format(String),

    /// A table record could not be decoded.
    #[error("invalid archive: record {index}: {field} {reason}")]
    Record {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// Recovered content does not match the stored hash or size.
    #[error("integrity check failed for {path}: {reason}")]
    Integrity { path: String, reason: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// A value does not fit the fixed-width on-disk field.
    #[error("{what} too large: {value}")]
    TooLarge { what: &'static str, value: u64 },
}

impl SqzipError {
    /// True for malformed-archive errors, including table record errors.
    pub fn is_format(&self) -> bool {
        matches!(self, SqzipError::Format(_) | SqzipError::Record { .. })
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, SqzipError::Integrity { .. })
    }
}

pub type Result<T> = std::result::Result<T, SqzipError>;
