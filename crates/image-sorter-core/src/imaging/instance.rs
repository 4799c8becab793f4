use image::DynamicImage;
use log::{debug, warn};
use std::sync::{Arc, Mutex, OnceLock};

use super::decoder::ImageDecoder;
use super::lock;
use super::orientation::ExifCorrector;
use super::scale::{byte_length, scale_to_fit};
use crate::error::Result;
use crate::logging::log_decode_error;
use crate::types::{ExifCorrection, ImageFile, ImageId, Size};

/// A shared, immutable decoded bitmap
pub type Bitmap = Arc<DynamicImage>;

struct ScaledImage {
    size: Size,
    image: Bitmap,
}

#[derive(Default)]
struct LargeImages {
    full: Option<Bitmap>,
    scaled: Option<ScaledImage>,
}

/// Cached bitmaps of a single image
///
/// `full` and `scaled` are dropped by [`ImageInstance::purge`]; the thumbnail
/// stays for the lifetime of the instance. A second request for a bitmap that
/// is being decoded blocks until the first decode finishes.
pub struct ImageInstance {
    file: Arc<ImageFile>,
    decoder: Arc<dyn ImageDecoder>,
    exif_corrector: Arc<dyn ExifCorrector>,
    thumbnail_size: Size,
    exif: OnceLock<ExifCorrection>,
    large: Mutex<LargeImages>,
    thumbnail: Mutex<Option<Bitmap>>,
}

impl ImageInstance {
    /// Create an instance without touching the file
    pub fn new(
        file: Arc<ImageFile>,
        decoder: Arc<dyn ImageDecoder>,
        exif_corrector: Arc<dyn ExifCorrector>,
        thumbnail_size: Size,
    ) -> Self {
        Self {
            file,
            decoder,
            exif_corrector,
            thumbnail_size,
            exif: OnceLock::new(),
            large: Mutex::new(LargeImages::default()),
            thumbnail: Mutex::new(None),
        }
    }

    /// Create an instance and compute its thumbnail right away
    ///
    /// A thumbnail that fails to decode is logged and retried on the next
    /// [`ImageInstance::get_thumbnail`] call.
    pub fn load(
        file: Arc<ImageFile>,
        decoder: Arc<dyn ImageDecoder>,
        exif_corrector: Arc<dyn ExifCorrector>,
        thumbnail_size: Size,
    ) -> Self {
        let instance = Self::new(file, decoder, exif_corrector, thumbnail_size);
        if let Err(e) = instance.get_thumbnail() {
            debug!("Thumbnail for {} not available yet: {}", instance.file.id, e);
        }
        instance
    }

    pub fn id(&self) -> ImageId {
        self.file.id
    }

    pub fn file(&self) -> &Arc<ImageFile> {
        &self.file
    }

    /// EXIF correction for this image, read once
    pub fn exif_correction(&self) -> ExifCorrection {
        *self.exif.get_or_init(|| {
            if let Some(exif) = self.file.exif {
                return exif;
            }
            let path = self.file.path();
            match self.exif_corrector.rotation_and_flip(&path) {
                Ok(exif) => exif,
                Err(e) => {
                    warn!("Could not read orientation of {}: {}", path.display(), e);
                    ExifCorrection::NONE
                }
            }
        })
    }

    /// Full resolution, EXIF corrected bitmap
    pub fn get_full(&self) -> Result<Bitmap> {
        let mut large = lock(&self.large);
        self.load_full(&mut large)
    }

    /// Bitmap fitted inside `size`, produced from the full bitmap
    pub fn get_scaled(&self, size: Size) -> Result<Bitmap> {
        let mut large = lock(&self.large);
        let full = self.load_full(&mut large)?;

        if let Some(scaled) = &large.scaled {
            if scaled.size == size {
                return Ok(Arc::clone(&scaled.image));
            }
        }

        debug!("Scaling {} to fit {}", self.file.id, size);
        let image = Arc::new(scale_to_fit(&full, size));
        large.scaled = Some(ScaledImage {
            size,
            image: Arc::clone(&image),
        });
        Ok(image)
    }

    /// Small preview bitmap, never purged
    pub fn get_thumbnail(&self) -> Result<Bitmap> {
        let mut thumbnail = lock(&self.thumbnail);
        if let Some(image) = thumbnail.as_ref() {
            return Ok(Arc::clone(image));
        }

        let path = self.file.path();
        let decoded = self
            .decoder
            .decode_scaled(&path, self.thumbnail_size)
            .map_err(|e| {
                log_decode_error(&path, &e);
                e
            })?;
        let corrected = self.exif_corrector.apply(decoded, self.exif_correction());
        let image = Arc::new(scale_to_fit(&corrected, self.thumbnail_size));

        *thumbnail = Some(Arc::clone(&image));
        Ok(image)
    }

    /// Drop the full and scaled bitmaps. The thumbnail is kept.
    pub fn purge(&self) {
        let mut large = lock(&self.large);
        large.full = None;
        large.scaled = None;
    }

    pub fn has_full(&self) -> bool {
        lock(&self.large).full.is_some()
    }

    /// Approximate memory held by the cached bitmaps
    pub fn get_byte_length(&self) -> u64 {
        let large_bytes = {
            let large = lock(&self.large);
            large.full.as_deref().map(byte_length).unwrap_or(0)
                + large
                    .scaled
                    .as_ref()
                    .map(|scaled| byte_length(&scaled.image))
                    .unwrap_or(0)
        };
        let thumbnail_bytes = lock(&self.thumbnail)
            .as_deref()
            .map(byte_length)
            .unwrap_or(0);

        large_bytes + thumbnail_bytes
    }

    fn load_full(&self, large: &mut LargeImages) -> Result<Bitmap> {
        if let Some(full) = &large.full {
            return Ok(Arc::clone(full));
        }

        let path = self.file.path();
        debug!("Decoding {}", path.display());
        let decoded = self.decoder.decode(&path).map_err(|e| {
            log_decode_error(&path, &e);
            e
        })?;

        if self.file.byte_size().is_none() {
            match self.decoder.file_size(&path) {
                Ok(byte_size) => {
                    self.file.set_byte_size(byte_size);
                }
                Err(e) => debug!("No byte size for {}: {}", path.display(), e),
            }
        }

        let full = Arc::new(self.exif_corrector.apply(decoded, self.exif_correction()));
        large.full = Some(Arc::clone(&full));
        // A new full bitmap invalidates anything scaled from the previous one
        large.scaled = None;
        Ok(full)
    }
}
