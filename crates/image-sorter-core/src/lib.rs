//! Core functionality for browsing a directory of images by similarity.
//!
//! This library provides the building blocks of the image sorter:
//! - File discovery and registration in the image database
//! - A bitmap cache with full, scaled and thumbnail variants
//! - Perceptual hashing on a worker pool
//! - The nearest-neighbor similarity index

// -- External Dependencies --

use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use hashing::{HashCalculator, HashOutcome};
pub use imaging::ImageCache;
pub use persistence::Database;
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod hashing;
pub mod imaging;
pub mod logging;
pub mod persistence;
pub mod types;

// -- Test Modules --
#[cfg(test)]
pub mod test_utils;

/// Phase of [`ImageSorter::index_similar_images`] reported to its progress
/// callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStage {
    Hashing,
    Indexing,
}

/// Main entry point: one open directory, its cached bitmaps and its
/// similarity index
pub struct ImageSorter {
    config: Config,
    db: Database,
    cache: ImageCache,
    calculator: Arc<HashCalculator>,
    images: Vec<Arc<ImageFile>>,
}

impl ImageSorter {
    /// Create an ImageSorter with the provided configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::from_config(&config)?;
        let cache = ImageCache::from_config(&config);
        let calculator = Arc::new(HashCalculator::from_config(&config));
        Ok(Self::from_parts(config, db, cache, calculator))
    }

    /// Assemble a sorter from already built components
    pub fn from_parts(
        config: Config,
        db: Database,
        cache: ImageCache,
        calculator: Arc<HashCalculator>,
    ) -> Self {
        Self {
            config,
            db,
            cache,
            calculator,
            images: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Shared handle to the calculator, e.g. to stop hashing from a signal
    /// handler
    pub fn hash_calculator(&self) -> Arc<HashCalculator> {
        Arc::clone(&self.calculator)
    }

    /// Images of the open directory, sorted by file name
    pub fn images(&self) -> &[Arc<ImageFile>] {
        &self.images
    }

    /// Find an image of the open directory by file name
    pub fn find_image(&self, file_name: &str) -> Option<Arc<ImageFile>> {
        self.images
            .iter()
            .find(|image| image.file_name == file_name)
            .cloned()
    }

    /// Discover and register the images of `directory` and reset the cache
    /// to them
    pub fn open_directory(&mut self, directory: &Path) -> Result<&[Arc<ImageFile>]> {
        let start = Instant::now();
        let discovered = discovery::discover_images(directory, &self.config)?;
        self.images = self.db.add_images(&discovered)?;
        self.cache.initialize(&self.images);

        info!(
            "Opened {} with {} images in {:.2?}",
            directory.display(),
            self.images.len(),
            start.elapsed()
        );
        Ok(&self.images)
    }

    /// Hash every image of the open directory and rebuild the similarity
    /// index from the hashes
    ///
    /// A cancelled run leaves the previous index untouched and returns the
    /// partial hashes.
    pub fn index_similar_images<F>(&mut self, mut progress: F) -> Result<HashOutcome>
    where
        F: FnMut(IndexStage, usize, usize),
    {
        let outcome = self.calculator.generate_hashes(&self.images, |done, total| {
            progress(IndexStage::Hashing, done, total)
        })?;

        if outcome.is_cancelled() {
            info!("Hashing cancelled, similarity index not rebuilt");
            return Ok(outcome);
        }

        self.calculator
            .build_similarity_index(outcome.hashes(), &mut self.db, |done, total| {
                progress(IndexStage::Indexing, done, total)
            })?;
        Ok(outcome)
    }

    /// Images most similar to `image`, best match first
    pub fn similar_images(&self, image: ImageId) -> Result<Vec<ImageFile>> {
        self.db.get_similar_images(image)
    }
}
