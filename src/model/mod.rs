pub mod autoencoder;
pub mod classifier;
pub mod model;
pub mod sequential;

pub use autoencoder::Autoencoder;
pub use classifier::MlpClassifier;
pub use model::{Model, ModelState};
pub use sequential::Sequential;

use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::ConfigError;

/// Which architecture a run builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Binary classification of the subject label.
    Classifier,
    /// Reconstruction of the input sample.
    Autoencoder,
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classifier" | "mlp" => Ok(ModelKind::Classifier),
            "autoencoder" | "ae" => Ok(ModelKind::Autoencoder),
            _ => Err(ConfigError::UnknownToken {
                kind: "model",
                value: s.to_string(),
                expected: "classifier, autoencoder",
            }),
        }
    }
}

/// Hyperparameters shared by the reference architectures.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub name: String,
    pub input_size: usize,
    pub hidden: usize,
    pub n_classes: usize,
    pub dropout: f64,
    pub seed: u64,
}

/// Builds the configured architecture behind the `Model` interface.
pub fn build_model(spec: &ModelSpec) -> Box<dyn Model> {
    match spec.kind {
        ModelKind::Classifier => Box::new(MlpClassifier::new(
            spec.name.clone(),
            spec.input_size,
            spec.hidden,
            spec.n_classes,
            spec.dropout,
            spec.seed,
        )),
        ModelKind::Autoencoder => Box::new(Autoencoder::new(
            spec.name.clone(),
            spec.input_size,
            spec.hidden,
            spec.seed,
        )),
    }
}
