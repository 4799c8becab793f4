#[allow(clippy::module_inception)]
#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use image::{DynamicImage, Rgb, RgbImage};

    use crate::error::Error;
    use crate::hashing::{
        pool_size, rank_similar_images, DctHasher, HashCalculator, MeanHasher, PHash,
        PerceptualHasher, SIMILAR_IMAGE_COUNT,
    };
    use crate::persistence::Database;
    use crate::test_utils::{image_file, StubDecoder};
    use crate::types::{ImageFile, ImageId};

    fn calculator(decoder: StubDecoder) -> HashCalculator {
        HashCalculator::new(Arc::new(decoder), Arc::new(DctHasher::new()))
    }

    fn images(names: &[&str]) -> Vec<Arc<ImageFile>> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| image_file(i as i64 + 1, name))
            .collect()
    }

    fn gradient(width: u32, height: u32, offset: i32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, _| {
            let value = ((x * 255 / width) as i32 + offset).clamp(0, 255) as u8;
            Rgb([value, value, value])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn hashes(entries: &[(i64, u64)]) -> BTreeMap<ImageId, PHash> {
        entries
            .iter()
            .map(|(id, hash)| (ImageId::new(*id), PHash(*hash)))
            .collect()
    }

    #[test]
    fn test_phash_distance() {
        let a = PHash(0b1011);
        let b = PHash(0b0010);
        assert_eq!(a.distance(&b), 2);
        assert_eq!(a.distance(&a), 0);
        assert!(a.is_similar(&b, 2));
        assert!(!a.is_similar(&b, 1));
        assert_eq!(PHash(u64::MAX).distance(&PHash(0)), 64);
    }

    #[test]
    fn test_dct_hash_tolerates_resize_and_brightness() {
        let hasher = DctHasher::new();
        let original = hasher.hash(&gradient(256, 192, 0));
        let variant = hasher.hash(&gradient(200, 150, 10));
        let different = hasher.hash(&checkerboard(256, 192, 16));

        assert!(original.distance(&variant) < original.distance(&different));
    }

    #[test]
    fn test_mean_hash_tolerates_resize() {
        let hasher = MeanHasher;
        let original = hasher.hash(&gradient(256, 192, 0));
        let resized = hasher.hash(&gradient(128, 96, 0));
        let different = hasher.hash(&checkerboard(256, 192, 32));

        assert!(original.distance(&resized) <= 2);
        assert!(original.distance(&resized) < original.distance(&different));
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(4, 100), 4);
        assert_eq!(pool_size(4, 2), 2);
        assert_eq!(pool_size(3, 0), 1);
        assert!(pool_size(0, 1000) >= 1);
    }

    #[test]
    fn test_generate_hashes_complete() {
        let calc = calculator(StubDecoder::new()).with_workers(2);
        let files = images(&["a.png", "b.png", "c.png", "d.png"]);

        let mut reported = Vec::new();
        let outcome = calc
            .generate_hashes(&files, |done, total| reported.push((done, total)))
            .unwrap();

        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.hashes().len(), 4);
        assert_eq!(reported, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
        assert!(!calc.is_running());
    }

    #[test]
    fn test_generate_hashes_empty() {
        let calc = calculator(StubDecoder::new());
        let mut calls = 0;
        let outcome = calc.generate_hashes(&[], |_, _| calls += 1).unwrap();

        assert!(outcome.hashes().is_empty());
        assert!(!outcome.is_cancelled());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_failed_decodes_are_omitted() {
        let decoder = StubDecoder::new().failing_on("broken.png");
        let calc = calculator(decoder).with_workers(2);
        let files = images(&["a.png", "broken.png", "c.png"]);

        let mut last = (0, 0);
        let outcome = calc.generate_hashes(&files, |done, total| last = (done, total)).unwrap();

        let hashes = outcome.into_hashes();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains_key(&ImageId::new(1)));
        assert!(!hashes.contains_key(&ImageId::new(2)));
        // Failures still count towards progress
        assert_eq!(last, (3, 3));
    }

    #[test]
    fn test_stop_from_progress_returns_partial_result() {
        let calc = calculator(StubDecoder::new()).with_workers(1);
        let files = images(&["a.png", "b.png", "c.png"]);

        let outcome = calc
            .generate_hashes(&files, |_, _| calc.stop_hashes())
            .unwrap();

        assert!(outcome.is_cancelled());
        assert!(outcome.hashes().len() <= 1);
        assert!(!calc.is_running());

        // The calculator is reusable after a stop
        let again = calc.generate_hashes(&files, |_, _| {}).unwrap();
        assert!(!again.is_cancelled());
        assert_eq!(again.hashes().len(), 3);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let calc = calculator(StubDecoder::new()).with_workers(1);
        calc.stop_hashes();

        let outcome = calc
            .generate_hashes(&images(&["a.png", "b.png"]), |_, _| {})
            .unwrap();
        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.hashes().len(), 2);
    }

    #[test]
    fn test_concurrent_run_rejected() {
        let calc = calculator(StubDecoder::new()).with_workers(1);
        let files = images(&["a.png", "b.png"]);

        let mut nested = None;
        calc.generate_hashes(&files, |_, _| {
            if nested.is_none() {
                nested = Some(calc.generate_hashes(&files, |_, _| {}));
            }
        })
        .unwrap();

        assert!(matches!(nested, Some(Err(Error::HashingInProgress))));
    }

    #[test]
    fn test_rank_excludes_self_and_orders_by_distance() {
        let ranked = rank_similar_images(&hashes(&[(1, 0b0000), (2, 0b0111), (3, 0b0001)]), 5);

        assert_eq!(ranked.len(), 3);
        let (id, neighbors) = &ranked[0];
        assert_eq!(*id, ImageId::new(1));
        let ids: Vec<i64> = neighbors.iter().map(|n| n.image_id.get()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(neighbors[0].distance, 1);
        assert_eq!(neighbors[1].distance, 3);
    }

    #[test]
    fn test_rank_ties_keep_id_order_and_limit() {
        let entries: Vec<(i64, u64)> = (1..=30).map(|id| (id, 0)).collect();
        let ranked = rank_similar_images(&hashes(&entries), SIMILAR_IMAGE_COUNT);

        let (_, neighbors) = &ranked[4];
        assert_eq!(neighbors.len(), SIMILAR_IMAGE_COUNT);
        let ids: Vec<i64> = neighbors.iter().map(|n| n.image_id.get()).collect();
        let expected: Vec<i64> = (1..=21).filter(|id| *id != 5).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_build_similarity_index() {
        let mut db = Database::open_in_memory().unwrap();
        let files: Vec<ImageFile> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|name| ImageFile::new(ImageId::NONE, "/stub", *name))
            .collect();
        let registered = db.add_images(&files).unwrap();
        let ids: Vec<i64> = registered.iter().map(|f| f.id.get()).collect();

        let calc = calculator(StubDecoder::new());
        let hashes = hashes(&[(ids[0], 0b0000), (ids[1], 0b1111), (ids[2], 0b0001)]);

        let mut reported = Vec::new();
        calc.build_similarity_index(&hashes, &mut db, |done, total| reported.push((done, total)))
            .unwrap();

        assert_eq!(reported, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(db.similar_image_count().unwrap(), 6);

        let similar = db.get_similar_images(registered[0].id).unwrap();
        assert_eq!(similar[0].id, registered[2].id);
        assert_eq!(similar[1].id, registered[1].id);

        let edges = db.get_similar_image_edges(registered[1].id).unwrap();
        let ranks: Vec<u32> = edges.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![0, 1]);
    }

    #[test]
    fn test_failed_build_keeps_previous_index() {
        let mut db = Database::open_in_memory().unwrap();
        let files: Vec<ImageFile> = ["a.png", "b.png"]
            .iter()
            .map(|name| ImageFile::new(ImageId::NONE, "/stub", *name))
            .collect();
        let registered = db.add_images(&files).unwrap();
        let (a, b) = (registered[0].id.get(), registered[1].id.get());

        let calc = calculator(StubDecoder::new());
        calc.build_similarity_index(&hashes(&[(a, 0), (b, 1)]), &mut db, |_, _| {})
            .unwrap();
        assert_eq!(db.similar_image_count().unwrap(), 2);

        // Id 999 is not registered, so writing its edges fails
        let broken = hashes(&[(a, 0), (b, 3), (999, 1)]);
        let result = calc.build_similarity_index(&broken, &mut db, |_, _| {});
        assert!(matches!(result, Err(Error::Storage(_))));

        let edges = db.get_similar_image_edges(registered[0].id).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].distance, 1);
    }
}
