//! Error types for the crate.
//!
//! Each layer has its own enum; [`Error`] wraps them for callers that drive a
//! whole run. Per-sample loading failures never surface here: the loaders log
//! them and move on.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading subject tables or recordings.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid npy file: {reason}")]
    Npy { path: PathBuf, reason: String },

    #[error("{path}, row {row}: {reason}")]
    Table { path: PathBuf, row: usize, reason: String },

    #[error("trial [{begin}, {end}) is outside a recording of {len} time points")]
    TrialBounds { begin: usize, end: usize, len: usize },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape { expected: Vec<usize>, actual: Vec<usize> },

    #[error("non-finite values in trial [{begin}, {end}), channel {channel}, sensor {sensor}")]
    NonFinite { begin: usize, end: usize, channel: usize, sensor: usize },
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn npy(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Npy { path: path.into(), reason: reason.into() }
    }
}

/// Failures of the checkpoint / ledger store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no checkpoint found at {0}")]
    NotFound(PathBuf),

    #[error("{path} exists but could not be parsed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Model state could not be applied to a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("state was saved from a `{saved}` model, cannot load into `{current}`")]
    Architecture { saved: String, current: String },

    #[error("parameter tensor {index} has {saved} values, model expects {expected}")]
    ParamShape { index: usize, saved: usize, expected: usize },

    #[error("state holds {saved} parameter tensors, model has {expected}")]
    ParamCount { saved: usize, expected: usize },

    #[error("optimizer state does not match: {0}")]
    Optimizer(String),
}

/// Failures of the training orchestrator and evaluator.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(
        "configured patience ({configured}) differs from checkpointed patience ({checkpointed}); \
         choose a resume policy of force-continue or reset-patience to proceed"
    )]
    PatienceMismatch { configured: usize, checkpointed: usize },

    #[error("loader `{0}` yielded no samples")]
    EmptyLoader(String),

    #[error("no checkpoint store configured")]
    NoStore,
}

/// Invalid configuration values or tokens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} `{value}` (expected one of: {expected})")]
    UnknownToken {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

/// Top-level error for a complete run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
