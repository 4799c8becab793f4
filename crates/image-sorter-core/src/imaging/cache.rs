use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::decoder::{FileDecoder, ImageDecoder};
use super::instance::{Bitmap, ImageInstance};
use super::lock;
use super::orientation::{ExifCorrector, FileExifCorrector};
use crate::config::{Config, DEFAULT_THUMBNAIL_SIZE};
use crate::error::Result;
use crate::types::{ImageFile, ImageId, Size};

/// Decoded bitmaps for the images of the active directory
///
/// The map lock is only held to look up or insert an instance. Decoding
/// happens inside the instance, so different images decode in parallel.
pub struct ImageCache {
    decoder: Arc<dyn ImageDecoder>,
    exif_corrector: Arc<dyn ExifCorrector>,
    thumbnail_size: Size,
    instances: Mutex<HashMap<ImageId, Arc<ImageInstance>>>,
    // Held by rebuilds and by instance creation during lookup
    initialize_lock: Mutex<()>,
}

impl ImageCache {
    pub fn new(decoder: Arc<dyn ImageDecoder>, exif_corrector: Arc<dyn ExifCorrector>) -> Self {
        Self {
            decoder,
            exif_corrector,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            instances: Mutex::new(HashMap::new()),
            initialize_lock: Mutex::new(()),
        }
    }

    /// Cache reading image files from disk with the configured thumbnail size
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(FileDecoder::new()), Arc::new(FileExifCorrector))
            .with_thumbnail_size(config.thumbnail_size)
    }

    pub fn with_thumbnail_size(mut self, thumbnail_size: Size) -> Self {
        self.thumbnail_size = thumbnail_size;
        self
    }

    pub fn thumbnail_size(&self) -> Size {
        self.thumbnail_size
    }

    /// Replace the cache contents with fresh instances for `images`
    ///
    /// Thumbnails are generated in parallel before the swap. Instances of
    /// images not in the list are dropped along with their bitmaps.
    pub fn initialize(&self, images: &[Arc<ImageFile>]) {
        let _guard = lock(&self.initialize_lock);
        let start = Instant::now();

        let fresh: HashMap<ImageId, Arc<ImageInstance>> = images
            .par_iter()
            .filter(|file| file.id.is_valid())
            .map(|file| {
                let instance = ImageInstance::load(
                    Arc::clone(file),
                    Arc::clone(&self.decoder),
                    Arc::clone(&self.exif_corrector),
                    self.thumbnail_size,
                );
                (file.id, Arc::new(instance))
            })
            .collect();

        let previous = std::mem::replace(&mut *lock(&self.instances), fresh);
        let released: u64 = previous.values().map(|i| i.get_byte_length()).sum();
        drop(previous);

        info!(
            "Image cache initialized with {} images in {:.2?}, released ~{}MB",
            images.len(),
            start.elapsed(),
            released / 1024 / 1024
        );
    }

    /// Instance for `image`, created on first use. `None` for the sentinel id.
    ///
    /// A new instance is registered under the map lock and gets its thumbnail
    /// once the lock is released. Creation waits for a running
    /// [`ImageCache::initialize`] so the instance lands in the new map.
    pub fn instance(&self, image: &Arc<ImageFile>) -> Option<Arc<ImageInstance>> {
        if !image.id.is_valid() {
            return None;
        }

        let (instance, created) = {
            let _guard = lock(&self.initialize_lock);
            let mut instances = lock(&self.instances);
            match instances.get(&image.id) {
                Some(instance) => (Arc::clone(instance), false),
                None => {
                    debug!("Creating cache instance for {}", image.id);
                    let instance = Arc::new(ImageInstance::new(
                        Arc::clone(image),
                        Arc::clone(&self.decoder),
                        Arc::clone(&self.exif_corrector),
                        self.thumbnail_size,
                    ));
                    instances.insert(image.id, Arc::clone(&instance));
                    (instance, true)
                }
            }
        };

        if created {
            if let Err(e) = instance.get_thumbnail() {
                debug!("Thumbnail for {} not available yet: {}", image.id, e);
            }
        }
        Some(instance)
    }

    pub fn get_full(&self, image: &Arc<ImageFile>) -> Result<Option<Bitmap>> {
        self.instance(image).map(|i| i.get_full()).transpose()
    }

    pub fn get_scaled(&self, image: &Arc<ImageFile>, size: Size) -> Result<Option<Bitmap>> {
        self.instance(image).map(|i| i.get_scaled(size)).transpose()
    }

    pub fn get_thumbnail(&self, image: &Arc<ImageFile>) -> Result<Option<Bitmap>> {
        self.instance(image).map(|i| i.get_thumbnail()).transpose()
    }

    /// Drop full and scaled bitmaps of every image, keeping thumbnails
    pub fn purge(&self) {
        let instances: Vec<Arc<ImageInstance>> =
            lock(&self.instances).values().cloned().collect();
        for instance in &instances {
            instance.purge();
        }
        debug!("Purged {} cache instances", instances.len());
    }

    pub fn contains(&self, id: ImageId) -> bool {
        lock(&self.instances).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.instances).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.instances).is_empty()
    }

    /// Approximate bytes held by all cached bitmaps
    pub fn get_byte_size(&self) -> u64 {
        let instances: Vec<Arc<ImageInstance>> =
            lock(&self.instances).values().cloned().collect();
        instances.iter().map(|i| i.get_byte_length()).sum()
    }

    pub fn get_size_in_mb(&self) -> f64 {
        self.get_byte_size() as f64 / 1024.0 / 1024.0
    }
}
