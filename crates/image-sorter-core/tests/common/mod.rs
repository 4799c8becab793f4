#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use image_sorter_core::{Config, HashAlgorithm};
use tempfile::TempDir;

/// Scene drawn at full size
pub const ORIGINAL: &str = "a_original.png";
/// Same scene, smaller, brighter and re-encoded as JPEG
pub const VARIANT: &str = "b_variant.jpg";
/// Unrelated stripe pattern
pub const UNRELATED: &str = "c_stripes.png";
/// Not an image despite its extension
pub const BROKEN: &str = "d_broken.png";

pub const ORIGINAL_SIZE: (u32, u32) = (640, 480);
pub const VARIANT_SIZE: (u32, u32) = (480, 360);

/// A gradient with a bright disc, shifted by `brightness`
pub fn scene(width: u32, height: u32, brightness: i32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let u = x as f32 / width as f32;
        let v = y as f32 / height as f32;

        let mut value = 40.0 + 150.0 * u;
        let (dx, dy) = (u - 0.35, v - 0.5);
        if dx * dx + dy * dy < 0.0625 {
            value += 60.0;
        }
        let value = (value as i32 + brightness).clamp(0, 255) as u8;
        Rgb([value, value.saturating_sub(20), value / 2])
    });
    DynamicImage::ImageRgb8(img)
}

/// Vertical black and white stripes
pub fn stripes(width: u32, height: u32, period: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if (x / period) % 2 == 0 {
            Rgb([250, 250, 250])
        } else {
            Rgb([10, 10, 10])
        }
    });
    DynamicImage::ImageRgb8(img)
}

/// Write the fixture images into a fresh temporary directory
pub fn create_fixture_dir(with_broken: bool) -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    scene(ORIGINAL_SIZE.0, ORIGINAL_SIZE.1, 0)
        .save(dir.path().join(ORIGINAL))
        .unwrap();
    scene(VARIANT_SIZE.0, VARIANT_SIZE.1, 8)
        .save(dir.path().join(VARIANT))
        .unwrap();
    stripes(ORIGINAL_SIZE.0, ORIGINAL_SIZE.1, 40)
        .save(dir.path().join(UNRELATED))
        .unwrap();

    if with_broken {
        let mut file = File::create(dir.path().join(BROKEN)).unwrap();
        file.write_all(b"DUMMY IMAGE DATA").unwrap();
    }

    // Ignored by discovery
    let mut notes = File::create(dir.path().join("notes.txt")).unwrap();
    notes.write_all(b"NOT AN IMAGE").unwrap();

    dir
}

/// Configuration keeping the database inside `dir`
pub fn test_config(dir: &Path, workers: usize) -> Config {
    let db_dir = dir.join("db");
    fs::create_dir_all(&db_dir).unwrap();

    Config {
        database_path: Some(db_dir.join("images.db")),
        hash_workers: workers,
        hash_algorithm: HashAlgorithm::Dct,
        ..Default::default()
    }
}

pub fn fixture_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Route library logs to the test output; repeated calls are harmless
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
