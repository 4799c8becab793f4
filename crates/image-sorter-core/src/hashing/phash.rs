//! # Perceptual hashing
//!
//! Perceptual hashes are fingerprints that stay close for visually similar
//! images, unlike cryptographic hashes where any change scrambles the output.
//! Both algorithms here produce a 64-bit hash compared by Hamming distance:
//!
//! - 0-3: nearly identical (same image, re-encoded or resized)
//! - 4-10: similar (same subject with moderate differences)
//! - above 10: different images
//!
//! [`DctHasher`] is the classic pHash: the low frequencies of a 2-D DCT over a
//! 32×32 grayscale image, thresholded at their mean. [`MeanHasher`] is an
//! average hash over an 8×8 grayscale image; cheaper but less robust to
//! contrast changes.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use rustdct::{Dct2, DctPlanner};
use std::fmt;
use std::sync::Arc;

use crate::config::HashAlgorithm;

/// A perceptual hash represented as a 64-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PHash(pub u64);

impl PHash {
    /// Calculate the Hamming distance between two perceptual hashes
    pub fn distance(&self, other: &PHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Check if two images are perceptually similar based on a threshold
    pub fn is_similar(&self, other: &PHash, threshold: u32) -> bool {
        self.distance(other) <= threshold
    }
}

impl fmt::Display for PHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Turns a decoded bitmap into a perceptual hash
pub trait PerceptualHasher: Send + Sync {
    fn hash(&self, img: &DynamicImage) -> PHash;
}

/// Build the hasher for a configured algorithm
pub fn hasher_for(algorithm: HashAlgorithm) -> Arc<dyn PerceptualHasher> {
    match algorithm {
        HashAlgorithm::Dct => Arc::new(DctHasher::new()),
        HashAlgorithm::Mean => Arc::new(MeanHasher),
    }
}

const DCT_SIZE: usize = 32;
const LOW_FREQUENCIES: usize = 8;

/// DCT based perceptual hash
pub struct DctHasher {
    dct: Arc<dyn rustdct::TransformType2And3<f32>>,
}

impl DctHasher {
    pub fn new() -> Self {
        let mut planner = DctPlanner::new();
        Self {
            dct: planner.plan_dct2(DCT_SIZE),
        }
    }
}

impl Default for DctHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher for DctHasher {
    fn hash(&self, img: &DynamicImage) -> PHash {
        let small = img
            .resize_exact(DCT_SIZE as u32, DCT_SIZE as u32, FilterType::Triangle)
            .to_luma32f();

        let mut matrix: Vec<f32> = small.into_raw();

        // Rows
        for row in matrix.chunks_exact_mut(DCT_SIZE) {
            self.dct.process_dct2(row);
        }

        // Columns, through a scratch column
        let mut column = [0.0f32; DCT_SIZE];
        for x in 0..LOW_FREQUENCIES {
            for y in 0..DCT_SIZE {
                column[y] = matrix[y * DCT_SIZE + x];
            }
            self.dct.process_dct2(&mut column);
            for y in 0..DCT_SIZE {
                matrix[y * DCT_SIZE + x] = column[y];
            }
        }

        let mut low = [0.0f32; LOW_FREQUENCIES * LOW_FREQUENCIES];
        for y in 0..LOW_FREQUENCIES {
            for x in 0..LOW_FREQUENCIES {
                low[y * LOW_FREQUENCIES + x] = matrix[y * DCT_SIZE + x];
            }
        }

        // The DC term only carries overall brightness
        let mean = low[1..].iter().sum::<f32>() / (low.len() - 1) as f32;

        let mut hash: u64 = 0;
        for (bit_pos, &coefficient) in low.iter().enumerate() {
            if coefficient > mean {
                hash |= 1u64 << bit_pos;
            }
        }

        PHash(hash)
    }
}

/// Average hash over an 8x8 grayscale thumbnail
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanHasher;

impl PerceptualHasher for MeanHasher {
    fn hash(&self, img: &DynamicImage) -> PHash {
        let small = img.resize_exact(8, 8, FilterType::Triangle);

        // Grayscale formula: 0.299*R + 0.587*G + 0.114*B
        let mut pixels = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                let pixel = small.get_pixel(x, y);
                pixels[(y as usize) * 8 + (x as usize)] =
                    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
            }
        }

        let mean = pixels.iter().sum::<f32>() / 64.0;

        let mut hash: u64 = 0;
        for (bit_pos, &p) in pixels.iter().enumerate() {
            if p > mean {
                hash |= 1u64 << bit_pos;
            }
        }

        PHash(hash)
    }
}
