use crate::error::ModelError;
use crate::layers::param::Param;
use crate::optim::optimizer::{Optimizer, OptimizerState};

/// Plain stochastic gradient descent: `w -= lr * grad`.
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<&mut Param>) {
        for param in params {
            for (w, g) in param.value.iter_mut().zip(&param.grad) {
                *w -= self.learning_rate * g;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Sgd { learning_rate: self.learning_rate }
    }

    fn load_state(&mut self, state: &OptimizerState, _param_sizes: &[usize]) -> Result<(), ModelError> {
        match state {
            // The configured learning rate wins; SGD carries nothing else.
            OptimizerState::Sgd { .. } => Ok(()),
            other => Err(ModelError::Optimizer(format!("expected SGD state, found {other:?}"))),
        }
    }
}
