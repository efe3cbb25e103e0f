// THEORY:
// The shift scan is embarrassingly parallel: every shift reads the same two immutable
// images and allocates its own window and histograms. `ParallelRegistration` spreads
// the shifts over a pool of workers and reassembles the scores in shift order, so the
// resulting series is identical to the sequential one.
//
// The pool follows the dispatcher/worker layout: one dispatcher task hands tasks to the
// workers round-robin, each worker runs the CPU-bound scoring on the blocking pool and
// answers through a oneshot channel.

use crate::core_modules::image_grid::RgbImage;
use crate::core_modules::mutual_information::MutualInformation;
use crate::core_modules::preprocess::{PreparedPair, prepare};
use crate::error::{AlignError, Result};
use crate::pipeline::{RegistrationConfig, ResultSeries, SHIFT_COUNT, Shift, score_shift};
use futures::future::join_all;
use log::info;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct ShiftTask {
    pub shift: Shift,
    pub result_sender: oneshot::Sender<Result<f64>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ShiftTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers scoring shifts of `pair`. Needs a tokio runtime.
    pub fn new(pair: Arc<PreparedPair>, scorer: MutualInformation, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ShiftTask>();
        let mut workers = Vec::with_capacity(worker_count + 1);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<ShiftTask>())
            .unzip();

        workers.push(tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                // A closed worker drops the task, and with it the result sender.
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        }));

        for mut worker_receiver in worker_receivers {
            let pair = Arc::clone(&pair);
            workers.push(tokio::spawn(async move {
                while let Some(ShiftTask {
                    shift,
                    result_sender,
                }) = worker_receiver.recv().await
                {
                    let pair = Arc::clone(&pair);
                    let result =
                        tokio::task::spawn_blocking(move || score_shift(&scorer, &pair, shift))
                            .await
                            .unwrap_or_else(|e| {
                                Err(AlignError::worker(format!("scoring task failed: {e}"))
                                    .at_shift(shift))
                            });
                    let _ = result_sender.send(result);
                }
            }));
        }

        Self {
            task_sender,
            workers,
        }
    }

    pub async fn score(&self, shift: Shift) -> Result<f64> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(ShiftTask {
                shift,
                result_sender,
            })
            .map_err(|_| AlignError::worker("failed to send task to worker pool"))?;
        result_receiver
            .await
            .map_err(|_| AlignError::worker(format!("no result received for shift {shift}")))?
    }

    /// Closes the task queue and waits for the dispatcher and workers to finish.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Parallel counterpart of [`crate::pipeline::RegistrationPipeline`].
#[derive(Debug, Clone)]
pub struct ParallelRegistration {
    config: RegistrationConfig,
    worker_count: usize,
}

impl ParallelRegistration {
    /// One worker per logical CPU.
    pub fn new(config: RegistrationConfig) -> Self {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: RegistrationConfig, worker_count: usize) -> Self {
        Self {
            config,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub async fn register(&self, image: &RgbImage) -> Result<ResultSeries> {
        self.register_prepared(Arc::new(prepare(image)?)).await
    }

    pub async fn register_prepared(&self, pair: Arc<PreparedPair>) -> Result<ResultSeries> {
        info!(
            "Scanning {SHIFT_COUNT} shifts on {} workers, bin size {}",
            self.worker_count,
            self.config.bin_size.get()
        );
        let pool = WorkerPool::new(pair, self.config.scorer(), self.worker_count);
        let results = join_all((0..SHIFT_COUNT).map(|shift| pool.score(shift))).await;
        pool.shutdown().await;
        // Collecting in shift order reports the lowest failing shift, like the sequential scan.
        let scores = results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(ResultSeries::from_scores(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::image_grid::IntensityImage;
    use crate::pipeline::{BinSize, JointStrategy, RegistrationPipeline};

    fn textured_pair() -> PreparedPair {
        let reference =
            IntensityImage::from_fn(12, 20, |row, col| ((row * 37 + col * 101) % 256) as f64);
        let comparison =
            IntensityImage::from_fn(12, 60, |row, col| ((row * 53 + col * 29 + 7) % 256) as f64);
        PreparedPair {
            reference,
            comparison,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parallel_scan_matches_sequential_scan() {
        let pair = textured_pair();
        for joint in [JointStrategy::Additive, JointStrategy::CoOccurrence] {
            let config = RegistrationConfig {
                bin_size: BinSize::new(4).unwrap(),
                joint,
                ..RegistrationConfig::default()
            };
            let sequential = RegistrationPipeline::new(config)
                .register_prepared(&pair)
                .unwrap();
            let parallel = ParallelRegistration::with_workers(config, 3)
                .register_prepared(Arc::new(pair.clone()))
                .await
                .unwrap();
            assert_eq!(parallel, sequential);
        }
    }

    #[tokio::test]
    async fn single_worker_still_scans_every_shift() {
        let series = ParallelRegistration::with_workers(RegistrationConfig::default(), 0)
            .register_prepared(Arc::new(textured_pair()))
            .await
            .unwrap();
        assert_eq!(series.len(), SHIFT_COUNT);
        assert_eq!(series.entries().last().unwrap().shift, 40);
    }

    #[tokio::test]
    async fn lowest_failing_shift_is_reported() {
        let pair = PreparedPair {
            reference: IntensityImage::from_fn(3, 10, |_, _| 1.0),
            comparison: IntensityImage::from_fn(3, 30, |_, _| 1.0),
        };
        let err = ParallelRegistration::with_workers(RegistrationConfig::default(), 4)
            .register_prepared(Arc::new(pair))
            .await
            .unwrap_err();
        assert!(matches!(err, AlignError::AtShift { shift: 0, .. }));
    }
}
