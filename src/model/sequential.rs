use crate::layers::{Layer, Param};
use crate::math::matrix::Matrix;

/// Ordered stack of layers with a shared training flag.
#[derive(Debug, Clone)]
pub struct Sequential {
    pub layers: Vec<Layer>,
    training: bool,
}

impl Sequential {
    pub fn new(layers: Vec<Layer>) -> Sequential {
        Sequential { layers, training: true }
    }

    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let training = self.training;
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, training);
        }
        current
    }

    pub fn backward(&mut self, grad_output: &Matrix) {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        self.layers.iter_mut().flat_map(|l| l.params_mut()).collect()
    }

    pub fn params(&self) -> Vec<&Param> {
        self.layers.iter().flat_map(|l| l.params()).collect()
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }
}
