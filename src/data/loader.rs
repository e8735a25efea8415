use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{error, warn};

use crate::data::batch::{Batch, Sample};
use crate::data::dataset::SampleSource;
use crate::data::transform::SampleShape;

/// Batches queued per worker ahead of the consumer.
const PREFETCH_DEPTH: usize = 2;

/// Batched, ordered iteration over a `SampleSource`.
///
/// With `num_workers == 0` batches are built on the calling thread. Otherwise
/// worker `w` builds batches `w, w + W, w + 2W, ...` in the background and
/// the iterator receives from the workers round-robin, so the batch order is
/// the same as single-threaded operation.
#[derive(Clone)]
pub struct DataLoader {
    name: String,
    source: Arc<dyn SampleSource>,
    batch_size: usize,
    num_workers: usize,
}

impl DataLoader {
    /// # Panics
    /// Panics if `batch_size == 0`.
    pub fn new(name: impl Into<String>, source: Arc<dyn SampleSource>, batch_size: usize, num_workers: usize) -> DataLoader {
        assert!(batch_size > 0, "batch_size must be at least 1");
        DataLoader { name: name.into(), source, batch_size, num_workers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of batches per pass; the last one may be short.
    pub fn len(&self) -> usize {
        self.source.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.source.len()
    }

    pub fn shape(&self) -> SampleShape {
        self.source.shape()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn iter(&self) -> BatchIter {
        let n_batches = self.len();
        let workers = self.num_workers.min(n_batches);
        if workers == 0 {
            return BatchIter {
                inner: Inner::Inline { source: Arc::clone(&self.source), batch_size: self.batch_size },
                next: 0,
                n_batches,
            };
        }

        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for w in 0..workers {
            let (tx, rx) = mpsc::sync_channel(PREFETCH_DEPTH);
            let source = Arc::clone(&self.source);
            let batch_size = self.batch_size;
            let spawned = thread::Builder::new()
                .name(format!("{}-loader-{w}", self.name))
                .spawn(move || worker_loop(source, batch_size, w, workers, n_batches, tx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Fall back to building batches inline.
                    error!("failed to spawn loader worker: {e}");
                    return BatchIter {
                        inner: Inner::Inline { source: Arc::clone(&self.source), batch_size: self.batch_size },
                        next: 0,
                        n_batches,
                    };
                }
            }
            receivers.push(rx);
        }
        BatchIter { inner: Inner::Prefetch { receivers, handles }, next: 0, n_batches }
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Batch;
    type IntoIter = BatchIter;

    fn into_iter(self) -> BatchIter {
        self.iter()
    }
}

enum Inner {
    Inline {
        source: Arc<dyn SampleSource>,
        batch_size: usize,
    },
    Prefetch {
        receivers: Vec<Receiver<Batch>>,
        handles: Vec<JoinHandle<()>>,
    },
}

/// Iterator over one pass of a `DataLoader`. Batches whose samples all
/// failed to load are skipped.
pub struct BatchIter {
    inner: Inner,
    next: usize,
    n_batches: usize,
}

impl Iterator for BatchIter {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        while self.next < self.n_batches {
            let index = self.next;
            self.next += 1;
            let batch = match &self.inner {
                Inner::Inline { source, batch_size } => build_batch(source.as_ref(), index, *batch_size),
                Inner::Prefetch { receivers, .. } => match receivers[index % receivers.len()].recv() {
                    Ok(batch) => batch,
                    Err(_) => {
                        error!("loader worker exited before batch {index}");
                        self.next = self.n_batches;
                        return None;
                    }
                },
            };
            if !batch.is_empty() {
                return Some(batch);
            }
        }
        None
    }
}

impl Drop for BatchIter {
    fn drop(&mut self) {
        if let Inner::Prefetch { receivers, handles } = &mut self.inner {
            // Disconnect first so blocked workers see a failed send and exit.
            receivers.clear();
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(
    source: Arc<dyn SampleSource>,
    batch_size: usize,
    worker: usize,
    workers: usize,
    n_batches: usize,
    tx: SyncSender<Batch>,
) {
    for index in (worker..n_batches).step_by(workers) {
        let batch = build_batch(source.as_ref(), index, batch_size);
        if tx.send(batch).is_err() {
            return;
        }
    }
}

/// Builds batch `index`, dropping samples that fail to load.
fn build_batch(source: &dyn SampleSource, index: usize, batch_size: usize) -> Batch {
    let start = index * batch_size;
    let end = (start + batch_size).min(source.len());
    let samples: Vec<Sample> = (start..end)
        .filter_map(|i| match source.get(i) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("dropping sample {i}: {e}");
                None
            }
        })
        .collect();
    Batch::from_samples(samples, source.shape().numel())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;

    /// Sample `i` is `[i, i]`; indices listed in `broken` fail.
    struct Counting {
        n: usize,
        broken: Vec<usize>,
    }

    impl SampleSource for Counting {
        fn len(&self) -> usize {
            self.n
        }

        fn shape(&self) -> SampleShape {
            SampleShape { channels: 1, sensors: 1, bins: 2 }
        }

        fn get(&self, index: usize) -> Result<Sample, DataError> {
            if self.broken.contains(&index) {
                return Err(DataError::TrialBounds { begin: 0, end: 1, len: 0 });
            }
            Ok(Sample { input: vec![index as f64; 2], label: index % 2 })
        }
    }

    fn firsts(loader: &DataLoader) -> Vec<Vec<f64>> {
        loader
            .iter()
            .map(|b| (0..b.len()).map(|r| b.inputs.get(r, 0)).collect())
            .collect()
    }

    #[test]
    fn last_batch_is_short() {
        let loader = DataLoader::new("t", Arc::new(Counting { n: 10, broken: vec![] }), 4, 0);
        assert_eq!(loader.len(), 3);
        let sizes: Vec<usize> = loader.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn workers_preserve_batch_order() {
        let source: Arc<dyn SampleSource> = Arc::new(Counting { n: 37, broken: vec![] });
        let inline = DataLoader::new("a", Arc::clone(&source), 5, 0);
        let threaded = DataLoader::new("b", source, 5, 3);
        assert_eq!(firsts(&inline), firsts(&threaded));
    }

    #[test]
    fn failed_samples_are_dropped_not_fatal() {
        let loader = DataLoader::new("t", Arc::new(Counting { n: 6, broken: vec![1, 4, 5] }), 3, 2);
        let seen: Vec<Vec<f64>> = firsts(&loader);
        assert_eq!(seen, vec![vec![0.0, 2.0], vec![3.0]]);
    }

    #[test]
    fn fully_broken_batches_are_skipped() {
        let loader = DataLoader::new("t", Arc::new(Counting { n: 4, broken: vec![0, 1] }), 2, 0);
        assert_eq!(loader.iter().count(), 1);
    }

    #[test]
    fn dropping_an_iterator_early_stops_workers() {
        let loader = DataLoader::new("t", Arc::new(Counting { n: 100, broken: vec![] }), 1, 4);
        let mut it = loader.iter();
        assert!(it.next().is_some());
        drop(it);
    }
}
