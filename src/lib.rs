pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod model;
pub mod optim;
pub mod persist;
pub mod run;
pub mod train;

// Convenience re-exports
pub use config::{RunConfig, RunMode};
pub use data::{DataLoader, LoadingMode, SampleSource, Split, SplitAssignment, SplitConfig};
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use model::{Model, ModelKind};
pub use persist::{Checkpoint, CheckpointStore, Ledger};
pub use run::{run, RunOutcome};
pub use train::{FitReport, ResumePolicy, Trainer, TrainerConfig, TrainerState};
