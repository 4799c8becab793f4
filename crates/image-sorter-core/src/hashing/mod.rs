//! Perceptual hashing and the similarity index built from it.
//!
//! [`HashCalculator::generate_hashes`] decodes each image at a small size on
//! a pool of worker threads and hashes it. The hashes are then ranked into
//! per-image neighbor lists and written to the store with
//! [`HashCalculator::build_similarity_index`].

mod calculator;
mod phash;
mod similarity;
mod worker;

pub use calculator::{HashCalculator, HashOutcome, SIMILAR_IMAGE_COUNT};
pub use phash::{hasher_for, DctHasher, MeanHasher, PHash, PerceptualHasher};
pub use similarity::{rank_similar_images, ImageHashes, Neighbor};
pub use worker::{pool_size, HashResult};

#[cfg(test)]
mod tests;
