use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the image-sorter library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image could not be read or decoded
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Similarity store or image table failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// EXIF metadata could not be read
    #[error("EXIF error: {0}")]
    Exif(String),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A hash generation run is already active on this calculator
    #[error("Hash generation is already in progress")]
    HashingInProgress,

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Wrap an image crate error with the path it was raised for
    pub fn decode(path: &Path, err: impl std::fmt::Display) -> Self {
        Error::Decode {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}
