use crate::data::batch::Batch;
use crate::loss::criterion::Criterion;
use crate::math::matrix::Matrix;

/// Reconstruction MSE: the target is the batch input itself.
pub struct MseLoss;

impl Criterion for MseLoss {
    /// Scalar MSE: mean((output - input)²) over every element.
    fn loss(&self, output: &Matrix, batch: &Batch) -> f64 {
        let n = output.data.len();
        if n == 0 {
            return 0.0;
        }
        output
            .data
            .iter()
            .zip(&batch.inputs.data)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            / n as f64
    }

    /// 2 (output - input) / n_elements
    fn gradient(&self, output: &Matrix, batch: &Batch) -> Matrix {
        let scale = 2.0 / output.data.len().max(1) as f64;
        let data = output
            .data
            .iter()
            .zip(&batch.inputs.data)
            .map(|(a, b)| scale * (a - b))
            .collect();
        Matrix::from_vec(output.rows, output.cols, data)
    }
}
