//! The two interchangeable sample sources.
//!
//! `EagerDataset` reads every subject once and keeps all samples in memory.
//! `ChunkedDataset` keeps only trial references and re-reads the owning
//! subject's recording on every access, so its footprint does not grow with
//! the dataset. Both yield identical samples, in the same order, for the same
//! trial list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::data::batch::Sample;
use crate::data::partition::{Split, SplitAssignment};
use crate::data::recording::{recording_path, Recording};
use crate::data::subject::{trial_refs, Subject, TrialRef};
use crate::data::transform::{Preprocessor, SampleShape};
use crate::error::{ConfigError, DataError};

/// How samples are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// Whole split preprocessed into memory up front.
    Eager,
    /// One trial read and preprocessed per access.
    Chunked,
}

impl FromStr for LoadingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(LoadingMode::Eager),
            "chunked" => Ok(LoadingMode::Chunked),
            _ => Err(ConfigError::UnknownToken { kind: "loading mode", value: s.to_string(), expected: "eager, chunked" }),
        }
    }
}

/// Random-access source of samples shared with loader worker threads.
pub trait SampleSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> SampleShape;

    fn get(&self, index: usize) -> Result<Sample, DataError>;
}

/// The trials of one split, in subject assignment order, optionally shuffled
/// once with `shuffle_seed`.
pub fn trials_for_split(
    assignment: &SplitAssignment,
    split: Split,
    subjects: &[Subject],
    shuffle_seed: Option<u64>,
) -> Vec<TrialRef> {
    let mut trials = trial_refs(assignment.select(split, subjects));
    if let Some(seed) = shuffle_seed {
        trials.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    debug!(split = split.as_str(), trials = trials.len(), "selected trials");
    trials
}

/// Shape of the samples `trials` will produce, read from the first
/// recording that opens. `None` if no recording is readable.
fn probe_shape(data_dir: &Path, trials: &[TrialRef], pre: &Preprocessor) -> Option<SampleShape> {
    let mut tried: Vec<&str> = Vec::new();
    for t in trials {
        if tried.contains(&t.subject.as_str()) {
            continue;
        }
        tried.push(&t.subject);
        if let Ok(rec) = Recording::read(&recording_path(data_dir, &t.subject)) {
            if let [_, sensors, _] = rec.shape.as_slice() {
                return Some(pre.shape(*sensors, t.trial.len()));
            }
        }
    }
    None
}

fn empty_shape(trials: &[TrialRef], pre: &Preprocessor) -> SampleShape {
    pre.shape(0, trials.first().map(|t| t.trial.len()).unwrap_or(0))
}

fn check_shape(input: &[f64], shape: SampleShape) -> Result<(), DataError> {
    if input.len() != shape.numel() {
        return Err(DataError::Shape {
            expected: vec![shape.channels, shape.sensors, shape.bins],
            actual: vec![input.len()],
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Eager
// ---------------------------------------------------------------------------

/// All samples of a split, preprocessed into memory.
#[derive(Debug, Clone)]
pub struct EagerDataset {
    shape: SampleShape,
    samples: Vec<Sample>,
}

impl EagerDataset {
    /// Reads each subject's recording once and materializes all its trials.
    ///
    /// Unreadable recordings are skipped with a warning; their trials are
    /// simply absent. Trials that do not fit the recording, or whose shape
    /// differs from the first sample's, are skipped the same way.
    pub fn load(data_dir: &Path, trials: &[TrialRef], pre: Preprocessor) -> EagerDataset {
        let mut by_subject: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for (i, t) in trials.iter().enumerate() {
            by_subject
                .entry(t.subject.as_str())
                .or_insert_with(|| {
                    order.push(t.subject.as_str());
                    Vec::new()
                })
                .push(i);
        }

        let mut slots: Vec<Option<Sample>> = vec![None; trials.len()];
        let mut shape: Option<SampleShape> = None;
        info!(subjects = order.len(), trials = trials.len(), "loading subjects into memory");

        for (n, subject) in order.iter().enumerate() {
            let path = recording_path(data_dir, subject);
            let recording = match Recording::read(&path) {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping subject {subject}: {e}");
                    continue;
                }
            };
            for &i in &by_subject[subject] {
                let t = &trials[i];
                let input = match pre.apply(&recording, t.trial) {
                    Ok(input) => input,
                    Err(e) => {
                        warn!(subject = %subject, begin = t.trial.begin, end = t.trial.end, "skipping trial: {e}");
                        continue;
                    }
                };
                let expected = *shape.get_or_insert_with(|| {
                    pre.shape(recording.shape[1], t.trial.len())
                });
                if let Err(e) = check_shape(&input, expected) {
                    warn!(subject = %subject, "skipping trial: {e}");
                    continue;
                }
                slots[i] = Some(Sample { input, label: t.label });
            }
            if order.len() > 10 && n % (order.len() / 10) == 0 {
                debug!("loaded {}/{} subjects", n + 1, order.len());
            }
        }

        let samples: Vec<Sample> = slots.into_iter().flatten().collect();
        info!(samples = samples.len(), "Loading successful");
        EagerDataset { shape: shape.unwrap_or_else(|| empty_shape(trials, &pre)), samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl SampleSource for EagerDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn shape(&self) -> SampleShape {
        self.shape
    }

    fn get(&self, index: usize) -> Result<Sample, DataError> {
        Ok(self.samples[index].clone())
    }
}

// ---------------------------------------------------------------------------
// Chunked
// ---------------------------------------------------------------------------

/// Trial references resolved lazily, one recording read per access.
#[derive(Debug, Clone)]
pub struct ChunkedDataset {
    data_dir: PathBuf,
    trials: Vec<TrialRef>,
    pre: Preprocessor,
    shape: SampleShape,
}

impl ChunkedDataset {
    pub fn new(data_dir: impl Into<PathBuf>, trials: Vec<TrialRef>, pre: Preprocessor) -> ChunkedDataset {
        let data_dir = data_dir.into();
        let shape = probe_shape(&data_dir, &trials, &pre).unwrap_or_else(|| {
            warn!("no readable recording among {} trials", trials.len());
            empty_shape(&trials, &pre)
        });
        ChunkedDataset { data_dir, trials, pre, shape }
    }

    pub fn trials(&self) -> &[TrialRef] {
        &self.trials
    }
}

impl SampleSource for ChunkedDataset {
    fn len(&self) -> usize {
        self.trials.len()
    }

    fn shape(&self) -> SampleShape {
        self.shape
    }

    fn get(&self, index: usize) -> Result<Sample, DataError> {
        let t = &self.trials[index];
        let recording = Recording::read(&recording_path(&self.data_dir, &t.subject))?;
        let input = self.pre.apply(&recording, t.trial)?;
        check_shape(&input, self.shape)?;
        Ok(Sample { input, label: t.label })
    }
}
