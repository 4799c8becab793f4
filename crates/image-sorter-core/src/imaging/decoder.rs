use image::codecs::jpeg::JpegDecoder;
use image::DynamicImage;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::scale::scale_to_fit;
use crate::error::{Error, Result};
use crate::types::Size;

/// Loads bitmaps from image files
pub trait ImageDecoder: Send + Sync {
    /// Decode the file at full resolution
    fn decode(&self, path: &Path) -> Result<DynamicImage>;

    /// Decode the file so that it fits inside `size`
    fn decode_scaled(&self, path: &Path, size: Size) -> Result<DynamicImage>;

    /// Size of the file on disk in bytes
    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

/// Decoder backed by the `image` crate
///
/// JPEG files are scaled inside the decoder (DCT scaling), which skips most
/// of the work of a full decode. Other formats are decoded in full and then
/// downscaled.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl FileDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_jpeg_scaled(&self, path: &Path, size: Size) -> Result<DynamicImage> {
        let file = File::open(path).map_err(|e| Error::decode(path, e))?;
        let mut decoder =
            JpegDecoder::new(BufReader::new(file)).map_err(|e| Error::decode(path, e))?;

        let requested_width = size.width.min(u16::MAX as u32) as u16;
        let requested_height = size.height.min(u16::MAX as u32) as u16;
        let (width, height) = decoder
            .scale(requested_width, requested_height)
            .map_err(|e| Error::decode(path, e))?;
        debug!(
            "JPEG decoder scaled {} to {}x{} for {}",
            path.display(),
            width,
            height,
            size
        );

        let img = DynamicImage::from_decoder(decoder).map_err(|e| Error::decode(path, e))?;
        Ok(scale_to_fit(&img, size))
    }
}

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        image::io::Reader::open(path)
            .map_err(|e| Error::decode(path, e))?
            .with_guessed_format()
            .map_err(|e| Error::decode(path, e))?
            .decode()
            .map_err(|e| Error::decode(path, e))
    }

    fn decode_scaled(&self, path: &Path, size: Size) -> Result<DynamicImage> {
        if matches!(image::ImageFormat::from_path(path), Ok(image::ImageFormat::Jpeg)) {
            return self.decode_jpeg_scaled(path, size);
        }

        let img = self.decode(path)?;
        Ok(scale_to_fit(&img, size))
    }
}
