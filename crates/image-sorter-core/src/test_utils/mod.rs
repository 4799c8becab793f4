//! Test doubles shared by the unit tests of the core crate.

use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::imaging::{scale_to_fit, ExifCorrector, ImageDecoder};
use crate::types::{ExifCorrection, ImageFile, ImageId, Size};

pub const STUB_DIRECTORY: &str = "/stub";
pub const STUB_IMAGE_SIZE: Size = Size::new(400, 300);
pub const STUB_FILE_SIZE: u64 = 12_345;

/// Registered image living in [`STUB_DIRECTORY`]
pub fn image_file(id: i64, name: &str) -> Arc<ImageFile> {
    Arc::new(ImageFile::new(ImageId::new(id), STUB_DIRECTORY, name))
}

/// Decoder that synthesizes bitmaps from file names and counts its calls
///
/// Every file name yields its own deterministic pattern, so two names never
/// produce the same bitmap.
#[derive(Default)]
pub struct StubDecoder {
    sizes: HashMap<String, Size>,
    failing: HashSet<String>,
    decode_calls: AtomicUsize,
    decode_scaled_calls: AtomicUsize,
}

impl StubDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full resolution of `name`; [`STUB_IMAGE_SIZE`] otherwise
    pub fn with_size(mut self, name: &str, size: Size) -> Self {
        self.sizes.insert(name.to_string(), size);
        self
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn decode_count(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }

    pub fn decode_scaled_count(&self) -> usize {
        self.decode_scaled_calls.load(Ordering::SeqCst)
    }

    fn synthesize(&self, path: &Path) -> Result<DynamicImage> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(Error::decode(path, "stub decode failure"));
        }

        let size = self.sizes.get(&name).copied().unwrap_or(STUB_IMAGE_SIZE);
        Ok(pattern(&name, size))
    }
}

impl ImageDecoder for StubDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        self.synthesize(path)
    }

    fn decode_scaled(&self, path: &Path, size: Size) -> Result<DynamicImage> {
        self.decode_scaled_calls.fetch_add(1, Ordering::SeqCst);
        let img = self.synthesize(path)?;
        Ok(scale_to_fit(&img, size))
    }

    fn file_size(&self, _path: &Path) -> Result<u64> {
        Ok(STUB_FILE_SIZE)
    }
}

/// Decoder whose scaled decodes of one file wait until the test lets them go
///
/// Entering the gated decode is announced on `entered`.
pub struct GatedDecoder {
    inner: StubDecoder,
    gated: String,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl GatedDecoder {
    /// Returns the decoder, a receiver signalled when the gated decode starts
    /// and a sender that lets it finish
    pub fn new(inner: StubDecoder, gated: &str) -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam::channel::unbounded();
        let (release_tx, release_rx) = crossbeam::channel::unbounded();
        let decoder = Self {
            inner,
            gated: gated.to_string(),
            entered: entered_tx,
            release: release_rx,
        };
        (decoder, entered_rx, release_tx)
    }
}

impl ImageDecoder for GatedDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        self.inner.decode(path)
    }

    fn decode_scaled(&self, path: &Path, size: Size) -> Result<DynamicImage> {
        if path.file_name().is_some_and(|name| name == self.gated.as_str()) {
            let _ = self.entered.send(());
            let _ = self.release.recv();
        }
        self.inner.decode_scaled(path, size)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        self.inner.file_size(path)
    }
}

/// Always reports the same orientation fix
pub struct FixedExif(pub ExifCorrection);

impl ExifCorrector for FixedExif {
    fn rotation_and_flip(&self, _path: &Path) -> Result<ExifCorrection> {
        Ok(self.0)
    }
}

/// Deterministic bitmap for `name`: diagonal bands whose slope and frequency
/// depend on the name
pub fn pattern(name: &str, size: Size) -> DynamicImage {
    let seed = name
        .bytes()
        .fold(17u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as u32));
    let fx = seed % 7 + 1;
    let fy = (seed / 7) % 5 + 1;
    let period = 16 + seed % 48;

    let img = RgbaImage::from_fn(size.width, size.height, |x, y| {
        let band = (x * fx + y * fy) % period;
        let value = if band < period / 2 { 230 } else { 25 };
        Rgba([value as u8, (value / 2) as u8, (255 - value) as u8, 255])
    });
    DynamicImage::ImageRgba8(img)
}
