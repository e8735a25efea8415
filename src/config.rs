//! Run configuration.
//!
//! `RunConfig` is deserialized from an optional TOML file; every field has a
//! default so a file only needs the values it changes. The CLI applies its
//! overrides on top before calling `validate`.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::data::dataset::LoadingMode;
use crate::data::partition::SplitConfig;
use crate::data::transform::{ChannelType, Feature};
use crate::error::ConfigError;
use crate::model::{ModelKind, ModelSpec};
use crate::optim::optimizer::OptimizerKind;
use crate::train::train_config::{ResumePolicy, TrainerConfig};

/// What a run does with existing checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Train from scratch, replacing any saved model of the same name.
    #[default]
    Overwrite,
    /// Resume the saved model if there is one, otherwise start fresh.
    Continue,
    /// Train from scratch without writing anything.
    EmptyRun,
    /// Load the saved model and score the test split only.
    Evaluate,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Overwrite => "overwrite",
            RunMode::Continue => "continue",
            RunMode::EmptyRun => "empty-run",
            RunMode::Evaluate => "evaluate",
        }
    }

    /// Whether the saved ledger's split seed takes precedence.
    pub fn reuses_saved_split(&self) -> bool {
        matches!(self, RunMode::Continue | RunMode::Evaluate)
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "overwrite" => Ok(RunMode::Overwrite),
            "continue" => Ok(RunMode::Continue),
            "empty-run" | "empty" => Ok(RunMode::EmptyRun),
            "evaluate" => Ok(RunMode::Evaluate),
            _ => Err(ConfigError::UnknownToken {
                kind: "run mode",
                value: s.to_string(),
                expected: "overwrite, continue, empty-run, evaluate",
            }),
        }
    }
}

/// Everything a run needs, passed by reference to each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding `trials.csv`, `participants.csv` and the recordings.
    pub data_dir: PathBuf,
    /// Directory for checkpoints and ledgers.
    pub save_dir: PathBuf,
    pub model_name: String,

    pub seed: u64,
    pub max_subjects: usize,
    /// Inclusive age bounds.
    pub min_age: f64,
    pub max_age: f64,
    pub train_fraction: f64,
    /// Shuffle each split's trials once with the split seed.
    pub shuffle: bool,

    pub channel: ChannelType,
    pub feature: Feature,
    pub loading: LoadingMode,
    pub batch_size: usize,
    pub num_workers: usize,

    pub model: ModelKind,
    /// Hidden width of the classifier, latent width of the autoencoder.
    pub hidden: usize,
    pub dropout: f64,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub patience: usize,
    /// Optional cap on the total number of epochs.
    pub max_epochs: Option<usize>,

    pub mode: RunMode,
    pub resume_policy: ResumePolicy,
    /// Report batch and projected epoch durations instead of training.
    pub timing: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let split = SplitConfig::default();
        RunConfig {
            data_dir: PathBuf::from("data"),
            save_dir: PathBuf::from("models"),
            model_name: "net".to_string(),
            seed: split.seed,
            max_subjects: split.max_subjects,
            min_age: split.age_range.0,
            max_age: split.age_range.1,
            train_fraction: split.train_fraction,
            shuffle: true,
            channel: ChannelType::Mag,
            feature: Feature::Temporal,
            loading: LoadingMode::Eager,
            batch_size: 128,
            num_workers: 4,
            model: ModelKind::Classifier,
            hidden: 100,
            dropout: 0.25,
            optimizer: OptimizerKind::Adam,
            learning_rate: 1e-5,
            patience: 20,
            max_epochs: None,
            mode: RunMode::Overwrite,
            resume_policy: ResumePolicy::Abort,
            timing: false,
        }
    }
}

impl RunConfig {
    /// Reads a TOML file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<RunConfig, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.split_config(self.seed).validate()?;
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.patience == 0 {
            return Err(ConfigError::invalid("patience", "must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigError::invalid("learning_rate", format!("{} is not a positive number", self.learning_rate)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::invalid("dropout", format!("{} is outside [0, 1)", self.dropout)));
        }
        if self.hidden == 0 {
            return Err(ConfigError::invalid("hidden", "must be at least 1"));
        }
        if self.model_name.is_empty() || self.model_name.contains(|c: char| c == '/' || c == '\\') {
            return Err(ConfigError::invalid("model_name", format!("`{}` is not a valid file stem", self.model_name)));
        }
        Ok(())
    }

    /// Split parameters with `seed`, which may differ from `self.seed` when a
    /// saved ledger recorded another one.
    pub fn split_config(&self, seed: u64) -> SplitConfig {
        SplitConfig {
            seed,
            max_subjects: self.max_subjects,
            age_range: (self.min_age, self.max_age),
            train_fraction: self.train_fraction,
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::new(self.patience)
            .with_resume_policy(self.resume_policy)
            .with_max_epochs(self.max_epochs)
    }

    pub fn model_spec(&self, input_size: usize, n_classes: usize) -> ModelSpec {
        ModelSpec {
            kind: self.model,
            name: self.model_name.clone(),
            input_size,
            hidden: self.hidden,
            n_classes,
            dropout: self.dropout,
            seed: self.seed,
        }
    }
}
