use serde::{Serialize, Deserialize};

use crate::error::ModelError;
use crate::layers::param::Param;
use crate::math::matrix::Matrix;

/// Serializable snapshot of a model's trainable parameters.
///
/// `params` follows the order of `Model::params_mut()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub architecture: String,
    pub params: Vec<Vec<f64>>,
}

/// Capability interface the trainer and evaluator work against.
///
/// Concrete architectures are interchangeable implementers; which one runs is
/// decided by configuration (`ModelKind`), not by the trainer.
pub trait Model {
    /// Name used for checkpoint and ledger file stems.
    fn name(&self) -> &str;

    /// Number of flattened input features per sample.
    fn input_size(&self) -> usize;

    /// Batch forward pass; rows are samples. In training mode the model caches
    /// whatever `backward` needs.
    fn forward(&mut self, input: &Matrix) -> Matrix;

    /// Back-propagates `dL/d(output)` and accumulates parameter gradients.
    fn backward(&mut self, grad_output: &Matrix);

    /// Trainable parameters in a stable order.
    fn params_mut(&mut self) -> Vec<&mut Param>;

    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn state(&self) -> ModelState;

    fn load_state(&mut self, state: &ModelState) -> Result<(), ModelError>;

    fn zero_grad(&mut self) {
        for p in self.params_mut() {
            p.zero_grad();
        }
    }
}

/// Copies `state` into `params` after checking architecture and shapes.
pub(crate) fn apply_state(
    architecture: &str,
    params: Vec<&mut Param>,
    state: &ModelState,
) -> Result<(), ModelError> {
    if state.architecture != architecture {
        return Err(ModelError::Architecture {
            saved: state.architecture.clone(),
            current: architecture.to_string(),
        });
    }
    if state.params.len() != params.len() {
        return Err(ModelError::ParamCount { saved: state.params.len(), expected: params.len() });
    }
    for (index, (param, saved)) in params.iter().zip(&state.params).enumerate() {
        if param.len() != saved.len() {
            return Err(ModelError::ParamShape { index, saved: saved.len(), expected: param.len() });
        }
    }
    for (param, saved) in params.into_iter().zip(&state.params) {
        param.value.copy_from_slice(saved);
        param.zero_grad();
    }
    Ok(())
}
