use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::math::matrix::Matrix;

/// Inverted dropout. Identity in inference mode.
#[derive(Debug, Clone)]
pub struct Dropout {
    pub rate: f64,
    rng: StdRng,
    mask: Option<Matrix>,
}

impl Dropout {
    pub fn new(rate: f64, seed: u64) -> Dropout {
        assert!((0.0..1.0).contains(&rate), "dropout rate must be in [0, 1)");
        Dropout { rate, rng: StdRng::seed_from_u64(seed), mask: None }
    }

    pub fn forward(&mut self, input: &Matrix, training: bool) -> Matrix {
        if !training || self.rate == 0.0 {
            self.mask = None;
            return input.clone();
        }
        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        let mask_data = (0..input.data.len())
            .map(|_| if self.rng.gen::<f64>() < keep { scale } else { 0.0 })
            .collect();
        let mask = Matrix::from_vec(input.rows, input.cols, mask_data);
        let out = input.hadamard(&mask);
        self.mask = Some(mask);
        out
    }

    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        match &self.mask {
            Some(mask) => grad_output.hadamard(mask),
            None => grad_output.clone(),
        }
    }
}
