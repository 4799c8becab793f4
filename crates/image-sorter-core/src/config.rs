use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Size;

/// Bounding box of the eagerly computed thumbnails
pub const DEFAULT_THUMBNAIL_SIZE: Size = Size::new(100, 100);

/// Bounding box images are decoded at before hashing
pub const DEFAULT_HASH_IMAGE_SIZE: Size = Size::new(128, 128);

/// Perceptual hash algorithm used by the hash workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// DCT based pHash over a 32x32 grayscale image
    Dct,
    /// Average hash over an 8x8 grayscale image
    Mean,
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for the image cache and the similarity index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file
    pub database_path: Option<PathBuf>,

    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,

    /// Log level
    pub log_level: LogLevel,

    /// Number of hash workers (0 = one per CPU core)
    pub hash_workers: usize,

    /// Bounding box used by the decode-at-scale path of the hash workers
    pub hash_image_size: Size,

    /// Bounding box of cached thumbnails
    pub thumbnail_size: Size,

    /// Perceptual hash algorithm
    pub hash_algorithm: HashAlgorithm,

    /// Maximum directory depth for scanning
    pub max_depth: Option<usize>,

    /// Whether to register files with unrecognized extensions
    pub process_unsupported_formats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: Some(PathBuf::from("image-sorter.db")),
            log_dir: None,
            log_level: LogLevel::Info,
            hash_workers: 0, // Auto
            hash_image_size: DEFAULT_HASH_IMAGE_SIZE,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            hash_algorithm: HashAlgorithm::Dct,
            max_depth: Some(1),
            process_unsupported_formats: false,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.thumbnail_size.is_empty() {
            return Err(Error::Configuration(format!(
                "Thumbnail size must be non-zero, got {}",
                self.thumbnail_size
            )));
        }

        if self.hash_image_size.is_empty() {
            return Err(Error::Configuration(format!(
                "Hash image size must be non-zero, got {}",
                self.hash_image_size
            )));
        }

        if self.database_path.is_none() {
            return Err(Error::Configuration(
                "Database path must be specified".to_string(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(Error::Configuration(
                "Maximum depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
