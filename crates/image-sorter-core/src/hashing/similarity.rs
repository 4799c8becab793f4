use rayon::prelude::*;
use std::collections::BTreeMap;

use super::phash::PHash;
use crate::types::ImageId;

/// Perceptual hashes of a batch, ordered by image id
pub type ImageHashes = BTreeMap<ImageId, PHash>;

/// One entry of an image's similar-images list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub image_id: ImageId,
    pub distance: u32,
}

/// For every hashed image, the `limit` closest other images by ascending
/// Hamming distance
///
/// Equal distances keep image id order, so the result is deterministic.
/// Lists are computed in parallel; the outer order follows `hashes`.
pub fn rank_similar_images(hashes: &ImageHashes, limit: usize) -> Vec<(ImageId, Vec<Neighbor>)> {
    let entries: Vec<(ImageId, PHash)> = hashes.iter().map(|(id, hash)| (*id, *hash)).collect();

    entries
        .par_iter()
        .map(|(image_id, hash)| {
            let mut neighbors: Vec<Neighbor> = entries
                .iter()
                .filter(|(other_id, _)| other_id != image_id)
                .map(|(other_id, other_hash)| Neighbor {
                    image_id: *other_id,
                    distance: hash.distance(other_hash),
                })
                .collect();

            // Stable sort keeps id order among equal distances
            neighbors.sort_by_key(|neighbor| neighbor.distance);
            neighbors.truncate(limit);

            (*image_id, neighbors)
        })
        .collect()
}
