use crossbeam::channel::{select, Receiver, Sender};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::phash::{PHash, PerceptualHasher};
use crate::imaging::ImageDecoder;
use crate::logging::log_decode_error;
use crate::types::{ImageFile, ImageId, Size};

/// Outcome of hashing one image. `hash` is `None` when the image failed to
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashResult {
    pub image_id: ImageId,
    pub hash: Option<PHash>,
}

/// Number of workers for a batch: the requested count, or one per CPU core
/// when 0, never more than there are images
pub fn pool_size(requested: usize, images: usize) -> usize {
    let workers = if requested == 0 {
        num_cpus::get()
    } else {
        requested
    };
    workers.min(images).max(1)
}

/// One hashing thread. Borrows everything from the calculator that spawned it.
pub(crate) struct HashWorker<'a> {
    pub id: usize,
    pub decoder: &'a dyn ImageDecoder,
    pub hasher: &'a dyn PerceptualHasher,
    pub image_size: Size,
    pub stopped: &'a AtomicBool,
}

impl HashWorker<'_> {
    /// Pull jobs until the queue is drained or a stop is signalled
    ///
    /// The stop channel never carries messages; it is closed to broadcast the
    /// stop to every worker at once.
    pub fn run(
        &self,
        jobs: Receiver<Arc<ImageFile>>,
        stop: Receiver<()>,
        results: Sender<HashResult>,
    ) {
        let mut hashed = 0usize;

        loop {
            // Checked between jobs: select! picks randomly when both are ready
            if self.stopped.load(Ordering::Acquire) {
                break;
            }

            select! {
                recv(stop) -> _ => break,
                recv(jobs) -> job => {
                    let Ok(file) = job else {
                        // Queue drained
                        break;
                    };
                    let result = self.hash_image(&file);
                    hashed += 1;
                    if results.send(result).is_err() {
                        // Nobody is collecting anymore
                        break;
                    }
                }
            }
        }

        debug!("Hash worker {} stopped after {} images", self.id, hashed);
    }

    fn hash_image(&self, file: &ImageFile) -> HashResult {
        let start = Instant::now();
        let path = file.path();

        let hash = match self.decoder.decode_scaled(&path, self.image_size) {
            Ok(img) => Some(self.hasher.hash(&img)),
            Err(e) => {
                log_decode_error(&path, &e);
                None
            }
        };

        trace!(
            "Worker {} hashed '{}' in {:.2?}",
            self.id,
            path.display(),
            start.elapsed()
        );

        HashResult {
            image_id: file.id,
            hash,
        }
    }
}
