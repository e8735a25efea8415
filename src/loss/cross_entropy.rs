use crate::data::batch::Batch;
use crate::loss::criterion::Criterion;
use crate::math::matrix::Matrix;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

/// Softmax cross-entropy over raw logits, with class-index targets.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Row-wise softmax, shifted by the row maximum for stability.
    pub fn softmax(logits: &Matrix) -> Matrix {
        let mut probs = logits.clone();
        for row in probs.data.chunks_mut(logits.cols.max(1)) {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for x in row.iter_mut() {
                *x = (*x - max).exp();
                sum += *x;
            }
            for x in row.iter_mut() {
                *x /= sum;
            }
        }
        probs
    }
}

impl Criterion for CrossEntropyLoss {
    /// L = -mean(log(softmax(z)[label]))
    fn loss(&self, output: &Matrix, batch: &Batch) -> f64 {
        let n = batch.len();
        if n == 0 {
            return 0.0;
        }
        let probs = CrossEntropyLoss::softmax(output);
        batch
            .labels
            .iter()
            .enumerate()
            .map(|(i, &label)| -(probs.get(i, label) + EPS).ln())
            .sum::<f64>()
            / n as f64
    }

    /// Combined softmax + cross-entropy gradient w.r.t. the logits:
    ///   dL/dz_i = (p_i - onehot_i) / n
    fn gradient(&self, output: &Matrix, batch: &Batch) -> Matrix {
        let n = batch.len().max(1) as f64;
        let mut grad = CrossEntropyLoss::softmax(output);
        for (i, &label) in batch.labels.iter().enumerate() {
            let p = grad.get(i, label);
            grad.set(i, label, p - 1.0);
        }
        grad.map(|g| g / n)
    }

    fn accuracy(&self, output: &Matrix, batch: &Batch) -> Option<f64> {
        let n = batch.len();
        if n == 0 {
            return Some(0.0);
        }
        let correct = output
            .argmax_rows()
            .iter()
            .zip(&batch.labels)
            .filter(|(pred, label)| pred == label)
            .count();
        Some(correct as f64 / n as f64)
    }
}
