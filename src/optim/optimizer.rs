use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::{ConfigError, ModelError};
use crate::layers::param::Param;

/// Which optimizer a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl FromStr for OptimizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            _ => Err(ConfigError::UnknownToken { kind: "optimizer", value: s.to_string(), expected: "adam, sgd" }),
        }
    }
}

/// Serializable internal state of an optimizer, stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerState {
    Sgd {
        learning_rate: f64,
    },
    Adam {
        learning_rate: f64,
        step: u64,
        m: Vec<Vec<f64>>,
        v: Vec<Vec<f64>>,
    },
}

/// Parameter-update hook driven once per training batch.
pub trait Optimizer {
    /// Applies one update from the gradients currently held in `params`.
    fn step(&mut self, params: Vec<&mut Param>);

    fn learning_rate(&self) -> f64;

    fn state(&self) -> OptimizerState;

    /// Restores `state` for parameters of the given lengths, in
    /// `Model::params_mut()` order.
    fn load_state(&mut self, state: &OptimizerState, param_sizes: &[usize]) -> Result<(), ModelError>;
}
