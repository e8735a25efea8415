use serde::{Serialize, Deserialize};
use tracing::info;

/// Metrics of one completed training epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number, counted across resumed runs.
    pub epoch: usize,
    /// Mean loss over the training split, measured in inference mode after
    /// the epoch's updates.
    pub train_loss: f64,
    pub valid_loss: f64,
    /// Only set when the criterion reports accuracy.
    pub train_accuracy: Option<f64>,
    pub valid_accuracy: Option<f64>,
    /// Whether `valid_loss` beat the previous best.
    pub improved: bool,
    /// Consecutive non-improving epochs after this one.
    pub patience_counter: usize,
    /// Wall-clock duration of the epoch, evaluation included.
    pub elapsed_ms: u64,
}

impl EpochStats {
    pub fn log(&self) {
        match (self.train_accuracy, self.valid_accuracy) {
            (Some(ta), Some(va)) => info!(
                epoch = self.epoch,
                elapsed_ms = self.elapsed_ms,
                "train loss {:.4} acc {:.2}% | valid loss {:.4} acc {:.2}%",
                self.train_loss,
                ta * 100.0,
                self.valid_loss,
                va * 100.0,
            ),
            _ => info!(
                epoch = self.epoch,
                elapsed_ms = self.elapsed_ms,
                "train loss {:.4} | valid loss {:.4}",
                self.train_loss,
                self.valid_loss,
            ),
        }
        if self.improved {
            info!(epoch = self.epoch, "validation loss improved to {:.6}", self.valid_loss);
        } else {
            info!(epoch = self.epoch, "no improvement for {} epoch(s)", self.patience_counter);
        }
    }
}
