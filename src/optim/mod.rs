pub mod adam;
pub mod optimizer;
pub mod sgd;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerKind, OptimizerState};
pub use sgd::Sgd;

/// Builds the configured optimizer.
pub fn build_optimizer(kind: OptimizerKind, learning_rate: f64) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
        OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
    }
}
