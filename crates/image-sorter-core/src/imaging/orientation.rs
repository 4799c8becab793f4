use exif::{In, Reader, Tag};
use image::DynamicImage;
use log::{debug, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ExifCorrection;

/// Supplies the orientation fix for an image file
pub trait ExifCorrector: Send + Sync {
    /// Rotation angle in degrees (clockwise) and horizontal flip flag
    fn rotation_and_flip(&self, path: &Path) -> Result<ExifCorrection>;

    /// Apply a correction to a decoded bitmap
    fn apply(&self, img: DynamicImage, correction: ExifCorrection) -> DynamicImage {
        apply_exif_correction(img, correction)
    }
}

/// Reads the `Orientation` tag from the file's EXIF block
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExifCorrector;

impl ExifCorrector for FileExifCorrector {
    fn rotation_and_flip(&self, path: &Path) -> Result<ExifCorrection> {
        let file = File::open(path)?;
        let mut buf_reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut buf_reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) | Err(exif::Error::InvalidFormat(_)) => {
                debug!("No EXIF data in {}", path.display());
                return Ok(ExifCorrection::NONE);
            }
            Err(e) => return Err(Error::Exif(format!("{}: {}", path.display(), e))),
        };

        let orientation = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1);

        Ok(orientation_to_correction(orientation))
    }
}

/// Never corrects anything. For sources known to be stored upright.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExifCorrection;

impl ExifCorrector for NoExifCorrection {
    fn rotation_and_flip(&self, _path: &Path) -> Result<ExifCorrection> {
        Ok(ExifCorrection::NONE)
    }
}

/// Map an EXIF orientation value (1-8) to rotate-then-flip parameters
pub fn orientation_to_correction(orientation: u32) -> ExifCorrection {
    match orientation {
        2 => ExifCorrection::new(0, true),
        3 => ExifCorrection::new(180, false),
        4 => ExifCorrection::new(180, true),
        5 => ExifCorrection::new(90, true),
        6 => ExifCorrection::new(90, false),
        7 => ExifCorrection::new(270, true),
        8 => ExifCorrection::new(270, false),
        _ => ExifCorrection::NONE,
    }
}

/// Rotate clockwise by the stored angle, then flip horizontally if flagged
///
/// Only quarter turns are meaningful for EXIF data; other angles are snapped
/// to the nearest quarter turn.
pub fn apply_exif_correction(img: DynamicImage, correction: ExifCorrection) -> DynamicImage {
    if correction.is_identity() {
        return img;
    }

    let angle = correction.rotation.rem_euclid(360);
    let quarter_turns = ((angle + 45) / 90) % 4;
    if angle % 90 != 0 {
        warn!(
            "Rotation of {} degrees is not a quarter turn, using {}",
            angle,
            quarter_turns * 90
        );
    }

    let rotated = match quarter_turns {
        1 => img.rotate90(),
        2 => img.rotate180(),
        3 => img.rotate270(),
        _ => img,
    };

    if correction.flipped {
        rotated.fliph()
    } else {
        rotated
    }
}
