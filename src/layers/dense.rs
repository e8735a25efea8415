use rand::Rng;

use crate::layers::param::Param;
use crate::math::matrix::Matrix;

/// Fully connected layer: `y = x * W + b`.
///
/// `weights` is stored `(input_size, output_size)` row-major, `biases` has
/// `output_size` entries.
#[derive(Debug, Clone)]
pub struct Dense {
    pub input_size: usize,
    pub output_size: usize,
    pub weights: Param,
    pub biases: Param,
    input: Option<Matrix>,
}

impl Dense {
    /// He-initialized weights, zero biases.
    pub fn new<R: Rng>(input_size: usize, output_size: usize, rng: &mut R) -> Dense {
        let weights = Matrix::he(input_size, output_size, rng);
        Dense {
            input_size,
            output_size,
            weights: Param::new(weights.data),
            biases: Param::new(vec![0.0; output_size]),
            input: None,
        }
    }

    fn weight_matrix(&self) -> Matrix {
        Matrix::from_vec(self.input_size, self.output_size, self.weights.value.clone())
    }

    pub fn forward(&mut self, input: &Matrix, training: bool) -> Matrix {
        assert_eq!(
            input.cols, self.input_size,
            "Dense layer expects {} inputs, got {}",
            self.input_size, input.cols
        );
        let out = input.matmul(&self.weight_matrix()).add_row(&self.biases.value);
        self.input = if training { Some(input.clone()) } else { None };
        out
    }

    /// Accumulates `dL/dW` and `dL/db` into the params' gradients and returns
    /// `dL/dx` for the previous layer.
    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        let input = self
            .input
            .as_ref()
            .expect("Dense::backward called without a training forward pass");

        let w_grad = input.transpose().matmul(grad_output);
        for (g, d) in self.weights.grad.iter_mut().zip(&w_grad.data) {
            *g += d;
        }
        for (g, d) in self.biases.grad.iter_mut().zip(grad_output.sum_rows()) {
            *g += d;
        }

        grad_output.matmul(&self.weight_matrix().transpose())
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.weights, &mut self.biases]
    }

    pub fn params(&self) -> [&Param; 2] {
        [&self.weights, &self.biases]
    }
}
