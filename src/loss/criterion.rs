use crate::data::batch::Batch;
use crate::math::matrix::Matrix;

/// Pluggable loss (and optional metric) used by the trainer and evaluator.
///
/// `loss` is the mean over the samples of `batch`; the evaluator re-weights it
/// by batch size when aggregating over a whole loader.
pub trait Criterion {
    fn loss(&self, output: &Matrix, batch: &Batch) -> f64;

    /// `dL/d(output)` for the same mean loss.
    fn gradient(&self, output: &Matrix, batch: &Batch) -> Matrix;

    /// Fraction of correctly classified samples; `None` for tasks without a
    /// notion of accuracy.
    fn accuracy(&self, _output: &Matrix, _batch: &Batch) -> Option<f64> {
        None
    }
}
