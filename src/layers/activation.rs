use serde::{Serialize, Deserialize};
use std::f64::consts::E;

use crate::math::matrix::Matrix;

/// Element-wise activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Derivative evaluated at the pre-activation value `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }
}

/// Activation applied as its own layer; caches the pre-activation for backprop.
#[derive(Debug, Clone)]
pub struct Activation {
    pub function: ActivationFunction,
    pre_activation: Option<Matrix>,
}

impl Activation {
    pub fn new(function: ActivationFunction) -> Activation {
        Activation { function, pre_activation: None }
    }

    pub fn forward(&mut self, input: &Matrix, training: bool) -> Matrix {
        let out = input.map(|x| self.function.function(x));
        self.pre_activation = if training { Some(input.clone()) } else { None };
        out
    }

    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        let z = self
            .pre_activation
            .as_ref()
            .expect("Activation::backward called without a training forward pass");
        let f = self.function;
        grad_output.hadamard(&z.map(|x| f.derivative(x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_derivative_is_a_step() {
        let relu = ActivationFunction::ReLU;
        assert_eq!(relu.function(-2.0), 0.0);
        assert_eq!(relu.derivative(-2.0), 0.0);
        assert_eq!(relu.derivative(3.0), 1.0);
    }

    #[test]
    fn backward_masks_negative_inputs() {
        let mut layer = Activation::new(ActivationFunction::ReLU);
        let x = Matrix::from_rows(&[vec![-1.0, 2.0]]);
        layer.forward(&x, true);
        let g = layer.backward(&Matrix::from_rows(&[vec![5.0, 5.0]]));
        assert_eq!(g.data, vec![0.0, 5.0]);
    }
}
