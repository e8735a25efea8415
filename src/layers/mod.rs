pub mod activation;
pub mod dense;
pub mod dropout;
pub mod param;

pub use activation::{Activation, ActivationFunction};
pub use dense::Dense;
pub use dropout::Dropout;
pub use param::Param;

use crate::math::matrix::Matrix;

/// One stage of a `Sequential` stack.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Activation(Activation),
    Dropout(Dropout),
}

impl Layer {
    pub fn forward(&mut self, input: &Matrix, training: bool) -> Matrix {
        match self {
            Layer::Dense(l) => l.forward(input, training),
            Layer::Activation(l) => l.forward(input, training),
            Layer::Dropout(l) => l.forward(input, training),
        }
    }

    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        match self {
            Layer::Dense(l) => l.backward(grad_output),
            Layer::Activation(l) => l.backward(grad_output),
            Layer::Dropout(l) => l.backward(grad_output),
        }
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        match self {
            Layer::Dense(l) => l.params_mut().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn params(&self) -> Vec<&Param> {
        match self {
            Layer::Dense(l) => l.params().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}
