//! Batch assembly: per-epoch shuffling, drop-last chunking, prefetching
//! worker threads, and collation into interleaved view tensors.
//!
//! Workers only read the shared `PairDataset`; each owns its own rng and
//! pushes finished batches through a bounded channel. The consumer sees
//! batches in completion order.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::augment::Augment;
use super::pair::{PairDataset, ViewPair};
use super::sample::ImageSample;
use crate::error::SimclrError;

type BatchResult = Result<Vec<ViewPair>, SimclrError>;

/// Groups view pairs into fixed-size batches, reshuffled every epoch.
pub struct PairLoader<D, A> {
    dataset: Arc<PairDataset<D, A>>,
    batch_size: usize,
    workers: usize,
}

impl<D, A> PairLoader<D, A>
where
    D: Dataset<ImageSample> + 'static,
    A: Augment + 'static,
{
    /// Create a loader. `workers == 0` builds batches on the consuming thread.
    pub fn new(
        dataset: PairDataset<D, A>,
        batch_size: usize,
        workers: usize,
    ) -> Result<Self, SimclrError> {
        if batch_size == 0 {
            return Err(SimclrError::invalid("batch_size", "must be at least 1"));
        }
        Ok(Self {
            dataset: Arc::new(dataset),
            batch_size,
            workers,
        })
    }

    pub fn dataset(&self) -> &PairDataset<D, A> {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Full batches per epoch; a trailing partial batch is dropped.
    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.len() / self.batch_size
    }

    /// Start one epoch: shuffle all indices and begin producing batches.
    pub fn epoch(&self, rng: &mut StdRng) -> Result<EpochBatches<D, A>, SimclrError> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        order.shuffle(rng);
        let num_batches = self.batches_per_epoch();
        order.truncate(num_batches * self.batch_size);

        let source = if self.workers == 0 || num_batches == 0 {
            BatchSource::Inline {
                dataset: Arc::clone(&self.dataset),
                order,
                next: 0,
                rng: StdRng::seed_from_u64(rng.gen()),
            }
        } else {
            let workers = self.workers.min(num_batches);
            let (tx, rx) = mpsc::sync_channel::<BatchResult>(2 * workers);
            let order = Arc::new(order);

            for worker in 0..workers {
                let tx = tx.clone();
                let dataset = Arc::clone(&self.dataset);
                let order = Arc::clone(&order);
                let batch_size = self.batch_size;
                let mut worker_rng = StdRng::seed_from_u64(rng.gen());

                thread::Builder::new()
                    .name(format!("pair-loader-{worker}"))
                    .spawn(move || {
                        for b in (worker..num_batches).step_by(workers) {
                            let indices = &order[b * batch_size..(b + 1) * batch_size];
                            let batch = assemble(&dataset, indices, &mut worker_rng);
                            // Receiver gone: the epoch was abandoned.
                            if tx.send(batch).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            BatchSource::Prefetch { rx }
        };

        Ok(EpochBatches {
            source,
            batch_size: self.batch_size,
            total: num_batches,
            yielded: 0,
        })
    }
}

fn assemble<D, A>(dataset: &PairDataset<D, A>, indices: &[usize], rng: &mut StdRng) -> BatchResult
where
    D: Dataset<ImageSample>,
    A: Augment,
{
    indices.iter().map(|&i| dataset.get_pair(i, rng)).collect()
}

enum BatchSource<D, A> {
    Inline {
        dataset: Arc<PairDataset<D, A>>,
        order: Vec<usize>,
        next: usize,
        rng: StdRng,
    },
    Prefetch {
        rx: Receiver<BatchResult>,
    },
}

/// Batches of one epoch. Yields exactly `batches_per_epoch` items unless a
/// worker fails.
pub struct EpochBatches<D, A> {
    source: BatchSource<D, A>,
    batch_size: usize,
    total: usize,
    yielded: usize,
}

impl<D, A> Iterator for EpochBatches<D, A>
where
    D: Dataset<ImageSample>,
    A: Augment,
{
    type Item = BatchResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.total {
            return None;
        }
        let item = match &mut self.source {
            BatchSource::Inline {
                dataset,
                order,
                next,
                rng,
            } => {
                let start = *next * self.batch_size;
                *next += 1;
                assemble(dataset, &order[start..start + self.batch_size], rng)
            }
            BatchSource::Prefetch { rx } => match rx.recv() {
                Ok(batch) => batch,
                Err(_) => {
                    self.yielded = self.total;
                    return Some(Err(SimclrError::Dataset(
                        "pair loader workers exited before the epoch finished".to_string(),
                    )));
                }
            },
        };
        self.yielded += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.yielded;
        (remaining, Some(remaining))
    }
}

/// A collated batch ready for the model.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// Shape `[2N, C, H, W]`; rows `2k` and `2k + 1` are the two views of pair `k`.
    pub views: Tensor<B, 4>,
    /// Shape `[N]`. Passed through, unused by the loss.
    pub labels: Tensor<B, 1, Int>,
    /// Base dataset index of every flattened view (length `2N`).
    pub sources: Vec<usize>,
}

/// Collates `ViewPair`s into a `PairBatch` on a fixed device.
#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    device: B::Device,
    view_shape: [usize; 3],
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device, view_shape: [usize; 3]) -> Self {
        Self { device, view_shape }
    }
}

impl<B: Backend> Batcher<ViewPair, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<ViewPair>) -> PairBatch<B> {
        let n = items.len();
        let [c, h, w] = self.view_shape;
        let (flat, sources) = interleave_pairs(&items);

        let views = Tensor::from_data(TensorData::new(flat, [2 * n, c, h, w]), &self.device);
        let labels: Vec<i32> = items.iter().map(|p| p.label as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        PairBatch {
            views,
            labels,
            sources,
        }
    }
}

/// Flatten N pairs into 2N views: pair `k` lands at positions `2k` and `2k + 1`.
///
/// Returns the concatenated view data and the source index of every view.
pub fn interleave_pairs(pairs: &[ViewPair]) -> (Vec<f32>, Vec<usize>) {
    let view_len = pairs.first().map(|p| p.views[0].len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(2 * pairs.len() * view_len);
    let mut sources = Vec::with_capacity(2 * pairs.len());
    for pair in pairs {
        for view in &pair.views {
            flat.extend_from_slice(view);
            sources.push(pair.index);
        }
    }
    (flat, sources)
}
