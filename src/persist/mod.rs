pub mod checkpoint;
pub mod ledger;
pub mod store;

pub use checkpoint::Checkpoint;
pub use ledger::{Ledger, LEDGER_SCHEMA_VERSION};
pub use store::CheckpointStore;
