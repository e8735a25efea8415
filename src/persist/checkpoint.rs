use serde::{Serialize, Deserialize};

use crate::model::model::ModelState;
use crate::optim::optimizer::OptimizerState;

/// Snapshot written whenever validation loss strictly improves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 1-based index of the epoch that produced this state.
    pub epoch: usize,
    pub model: ModelState,
    pub optimizer: OptimizerState,
}
