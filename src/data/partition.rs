use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::data::subject::Subject;
use crate::error::ConfigError;

/// Parameters of the subject-level split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub seed: u64,
    pub max_subjects: usize,
    /// Inclusive `(min, max)` age filter.
    pub age_range: (f64, f64),
    /// Fraction of subjects assigned to training; the rest is halved between
    /// validation and test, any odd unit going to test.
    pub train_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig { seed: 420, max_subjects: 1000, age_range: (0.0, 100.0), train_fraction: 0.8 }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(ConfigError::invalid("train_fraction", format!("{} is outside [0, 1]", self.train_fraction)));
        }
        if self.age_range.0 > self.age_range.1 {
            return Err(ConfigError::invalid(
                "age_range",
                format!("min {} is above max {}", self.age_range.0, self.age_range.1),
            ));
        }
        Ok(())
    }
}

/// Which split a subject belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

/// Immutable subject-to-split assignment produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub seed: u64,
    pub train: Vec<String>,
    pub valid: Vec<String>,
    pub test: Vec<String>,
}

impl SplitAssignment {
    pub fn ids(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    pub fn split_of(&self, id: &str) -> Option<Split> {
        Split::ALL.into_iter().find(|s| self.ids(*s).iter().any(|x| x == id))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The subjects of `split`, in assignment order.
    pub fn select<'a>(&self, split: Split, subjects: &'a [Subject]) -> Vec<&'a Subject> {
        self.ids(split)
            .iter()
            .filter_map(|id| subjects.iter().find(|s| &s.id == id))
            .collect()
    }
}

/// Returns `(n_train, n_valid, n_test)` for `n` subjects.
pub fn split_sizes(n: usize, train_fraction: f64) -> (usize, usize, usize) {
    let n_train = ((n as f64 * train_fraction) as usize).min(n);
    let remaining = n - n_train;
    let n_valid = remaining / 2;
    (n_train, n_valid, remaining - n_valid)
}

/// Splits `subjects` into train / valid / test.
///
/// Subjects without an age, or with one outside `age_range`, are excluded
/// silently. The remaining pool is permuted with a `StdRng` seeded from
/// `config.seed`, truncated to `max_subjects` and cut into three contiguous
/// ranges, so the same seed and pool always give the same split.
pub fn partition(subjects: &[Subject], config: &SplitConfig) -> Result<SplitAssignment, ConfigError> {
    config.validate()?;
    let (min_age, max_age) = config.age_range;

    let mut pool: Vec<&str> = subjects
        .iter()
        .filter(|s| s.age.map(|a| a >= min_age && a <= max_age).unwrap_or(false))
        .map(|s| s.id.as_str())
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    pool.shuffle(&mut rng);
    pool.truncate(config.max_subjects);

    let (n_train, n_valid, n_test) = split_sizes(pool.len(), config.train_fraction);
    info!(
        "Using {} subjects: {} for train, {} for validation, and {} for test",
        pool.len(),
        n_train,
        n_valid,
        n_test
    );

    let owned = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    Ok(SplitAssignment {
        seed: config.seed,
        train: owned(&pool[..n_train]),
        valid: owned(&pool[n_train..n_train + n_valid]),
        test: owned(&pool[n_train + n_valid..]),
    })
}
