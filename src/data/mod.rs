pub mod batch;
pub mod dataset;
pub mod loader;
pub mod manifest;
pub mod partition;
pub mod recording;
pub mod subject;
pub mod transform;

pub use batch::{Batch, Sample};
pub use dataset::{trials_for_split, ChunkedDataset, EagerDataset, LoadingMode, SampleSource};
pub use loader::DataLoader;
pub use manifest::load_subjects;
pub use partition::{partition, Split, SplitAssignment, SplitConfig};
pub use recording::{recording_path, Recording};
pub use subject::{Subject, Trial, TrialRef};
pub use transform::{ChannelType, Feature, Preprocessor, SampleShape};

use std::path::Path;
use std::sync::Arc;

/// Builds the sample source for `trials` in the requested loading mode.
pub fn build_source(
    mode: LoadingMode,
    data_dir: &Path,
    trials: Vec<TrialRef>,
    pre: Preprocessor,
) -> Arc<dyn SampleSource> {
    match mode {
        LoadingMode::Eager => Arc::new(EagerDataset::load(data_dir, &trials, pre)),
        LoadingMode::Chunked => Arc::new(ChunkedDataset::new(data_dir, trials, pre)),
    }
}
