//! Decoding and in-memory caching of image bitmaps.
//!
//! Every image of the active directory gets an [`ImageInstance`] holding up to
//! three bitmaps:
//!
//! - full: the whole image, EXIF corrected
//! - scaled: the full bitmap fitted into the last requested box
//! - thumbnail: a small preview, computed eagerly and never purged
//!
//! The [`ImageCache`] owns the instances and is reset whenever a new
//! directory is opened.

mod cache;
mod decoder;
mod instance;
mod orientation;
mod scale;

pub use cache::ImageCache;
pub use decoder::{FileDecoder, ImageDecoder};
pub use instance::{Bitmap, ImageInstance};
pub use orientation::{
    apply_exif_correction, orientation_to_correction, ExifCorrector, FileExifCorrector,
    NoExifCorrection,
};
pub use scale::{byte_length, fit_to, scale_to_fit};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
