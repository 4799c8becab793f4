use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::types::Size;

/// Compute the largest size with the aspect ratio of `source` that fits in
/// `target`. Exactly one dimension is clamped to the target box.
pub fn fit_to(source: Size, target: Size) -> Size {
    if source.is_empty() || target.is_empty() {
        return Size::new(0, 0);
    }

    let ratio = source.width as f64 / source.height as f64;

    let mut height = target.height as f64;
    let mut width = (target.height as f64 * ratio).round();
    if width > target.width as f64 {
        width = target.width as f64;
        height = (target.width as f64 / ratio).round();
    }

    // Extreme ratios can round a side down to nothing
    Size::new((width as u32).max(1), (height as u32).max(1))
}

/// Resize a bitmap so that it fits inside `target`, preserving aspect ratio
pub fn scale_to_fit(img: &DynamicImage, target: Size) -> DynamicImage {
    let (width, height) = img.dimensions();
    let fitted = fit_to(Size::new(width, height), target);

    if fitted.width == width && fitted.height == height {
        return img.clone();
    }

    img.resize_exact(fitted.width, fitted.height, FilterType::Triangle)
}

/// Approximate in-memory footprint of a decoded bitmap (4 bytes per pixel)
pub fn byte_length(img: &DynamicImage) -> u64 {
    let (width, height) = img.dimensions();
    width as u64 * height as u64 * 4
}
