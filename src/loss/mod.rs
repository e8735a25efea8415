pub mod criterion;
pub mod cross_entropy;
pub mod mse;

pub use criterion::Criterion;
pub use cross_entropy::CrossEntropyLoss;
pub use mse::MseLoss;
