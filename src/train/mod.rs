pub mod epoch_stats;
pub mod evaluate;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use evaluate::{evaluate, Evaluation};
pub use train_config::{ResumePolicy, TrainerConfig};
pub use trainer::{FitReport, TimingReport, Trainer, TrainerState};
