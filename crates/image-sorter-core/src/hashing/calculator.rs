use crossbeam::channel::{bounded, unbounded, Sender};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use super::phash::{hasher_for, PerceptualHasher};
use super::similarity::{rank_similar_images, ImageHashes, Neighbor};
use super::worker::{pool_size, HashWorker};
use crate::config::{Config, DEFAULT_HASH_IMAGE_SIZE};
use crate::error::{Error, Result};
use crate::imaging::{lock, FileDecoder, ImageDecoder};
use crate::logging::log_storage_error;
use crate::persistence::Database;
use crate::types::{ImageFile, ImageId, Size};

/// Length of each image's similar-images list
pub const SIMILAR_IMAGE_COUNT: usize = 20;

/// Result of a hash generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    /// Every image was processed. Images that failed to decode are missing.
    Complete(ImageHashes),
    /// The run was stopped; holds the hashes collected until then
    Cancelled(ImageHashes),
}

impl HashOutcome {
    pub fn hashes(&self) -> &ImageHashes {
        match self {
            HashOutcome::Complete(hashes) | HashOutcome::Cancelled(hashes) => hashes,
        }
    }

    pub fn into_hashes(self) -> ImageHashes {
        match self {
            HashOutcome::Complete(hashes) | HashOutcome::Cancelled(hashes) => hashes,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HashOutcome::Cancelled(_))
    }
}

/// Computes perceptual hashes on a pool of worker threads and turns them into
/// the similarity index
///
/// One run at a time per calculator. [`HashCalculator::stop_hashes`] may be
/// called from any thread, including from the progress callback.
pub struct HashCalculator {
    decoder: Arc<dyn ImageDecoder>,
    hasher: Arc<dyn PerceptualHasher>,
    hash_image_size: Size,
    workers: usize,
    // Sender side of the stop broadcast for the active run
    stop: Mutex<Option<Sender<()>>>,
    stopped: AtomicBool,
    running: AtomicBool,
}

impl HashCalculator {
    pub fn new(decoder: Arc<dyn ImageDecoder>, hasher: Arc<dyn PerceptualHasher>) -> Self {
        Self {
            decoder,
            hasher,
            hash_image_size: DEFAULT_HASH_IMAGE_SIZE,
            workers: 0,
            stop: Mutex::new(None),
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(FileDecoder::new()), hasher_for(config.hash_algorithm))
            .with_workers(config.hash_workers)
            .with_hash_image_size(config.hash_image_size)
    }

    /// Number of worker threads; 0 means one per CPU core
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_hash_image_size(mut self, size: Size) -> Self {
        self.hash_image_size = size;
        self
    }

    /// Hash every image in `images`
    ///
    /// `progress` is called on the calling thread after each result with the
    /// number of images processed so far and the total. Failed decodes count
    /// as processed but are left out of the returned hashes.
    pub fn generate_hashes<F>(
        &self,
        images: &[Arc<ImageFile>],
        mut progress: F,
    ) -> Result<HashOutcome>
    where
        F: FnMut(usize, usize),
    {
        let total = images.len();
        if total == 0 {
            return Ok(HashOutcome::Complete(ImageHashes::new()));
        }

        // Never carries a message; dropping the sender closes it for every worker
        let (stop_tx, stop_rx) = bounded::<()>(0);
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::HashingInProgress);
        }
        self.stopped.store(false, Ordering::Release);
        *lock(&self.stop) = Some(stop_tx);

        let start = Instant::now();
        let (job_tx, job_rx) = bounded::<Arc<ImageFile>>(total);
        for image in images {
            // Capacity covers every job and the receiver is alive
            if job_tx.send(Arc::clone(image)).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded();
        let pool = pool_size(self.workers, total);
        info!("Hashing {} images on {} workers", total, pool);

        let mut hashes = ImageHashes::new();
        let mut processed = 0usize;
        let mut failed = 0usize;

        let run = thread::scope(|scope| -> Result<()> {
            let mut spawned = 0usize;
            for id in 0..pool {
                let worker = HashWorker {
                    id,
                    decoder: self.decoder.as_ref(),
                    hasher: self.hasher.as_ref(),
                    image_size: self.hash_image_size,
                    stopped: &self.stopped,
                };
                let jobs = job_rx.clone();
                let stop = stop_rx.clone();
                let results = result_tx.clone();

                match thread::Builder::new()
                    .name(format!("hash-worker-{}", id))
                    .spawn_scoped(scope, move || worker.run(jobs, stop, results))
                {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!("Could not start hash worker {}: {}", id, e),
                }
            }
            drop(result_tx);

            if spawned == 0 {
                return Err(Error::Unknown("no hash worker could be started".to_string()));
            }

            while processed < total {
                if self.stopped.load(Ordering::Acquire) {
                    break;
                }
                // Disconnects once every worker has exited
                let Ok(result) = result_rx.recv() else {
                    break;
                };

                processed += 1;
                match result.hash {
                    Some(hash) => {
                        hashes.insert(result.image_id, hash);
                    }
                    None => failed += 1,
                }
                progress(processed, total);
            }

            // Unblocks any worker still sending
            drop(result_rx);
            Ok(())
        });

        // Releases the stop sender so late workers exit and a new run can start
        lock(&self.stop).take();
        self.running.store(false, Ordering::Release);
        run?;

        let cancelled = self.stopped.load(Ordering::Acquire);
        info!(
            "Hashed {} of {} images in {:.2?} ({} failed{})",
            hashes.len(),
            total,
            start.elapsed(),
            failed,
            if cancelled { ", cancelled" } else { "" }
        );

        if cancelled {
            Ok(HashOutcome::Cancelled(hashes))
        } else {
            Ok(HashOutcome::Complete(hashes))
        }
    }

    /// Ask the active run to stop. No-op when nothing is running.
    pub fn stop_hashes(&self) {
        let mut stop = lock(&self.stop);
        if let Some(sender) = stop.take() {
            self.stopped.store(true, Ordering::Release);
            drop(sender);
            info!("Stopping hash workers");
        }
    }

    /// Whether a [`HashCalculator::generate_hashes`] run is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replace the similarity index in `store` with the ranked neighbors of
    /// every image in `hashes`
    ///
    /// The replacement is atomic: if any step fails the previous index stays
    /// in place. `progress` is called once per image written.
    pub fn build_similarity_index<F>(
        &self,
        hashes: &ImageHashes,
        store: &mut Database,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let start = Instant::now();
        let ranked = rank_similar_images(hashes, SIMILAR_IMAGE_COUNT);
        let total = ranked.len();
        debug!("Ranked neighbors of {} images in {:.2?}", total, start.elapsed());

        match write_similarity_index(&ranked, store, &mut progress) {
            Ok(edges) => {
                info!(
                    "Similarity index rebuilt with {} edges for {} images in {:.2?}",
                    edges,
                    total,
                    start.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                log_storage_error("rebuild similarity index", &e);
                Err(e)
            }
        }
    }
}

fn write_similarity_index<F>(
    ranked: &[(ImageId, Vec<Neighbor>)],
    store: &mut Database,
    progress: &mut F,
) -> Result<usize>
where
    F: FnMut(usize, usize),
{
    let total = ranked.len();
    let mut rebuild = store.start_recreate_similar_image_index()?;
    for (index, (image_id, neighbors)) in ranked.iter().enumerate() {
        for (rank, neighbor) in neighbors.iter().enumerate() {
            rebuild.add_similar_image(
                *image_id,
                neighbor.image_id,
                rank as u32,
                neighbor.distance,
            )?;
        }
        progress(index + 1, total);
    }
    rebuild.end_recreate_similar_image_index()
}
