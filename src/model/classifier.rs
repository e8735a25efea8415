use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::ModelError;
use crate::layers::{Activation, ActivationFunction, Dense, Dropout, Layer, Param};
use crate::math::matrix::Matrix;
use crate::model::model::{apply_state, Model, ModelState};
use crate::model::sequential::Sequential;

const ARCHITECTURE: &str = "mlp_classifier";

/// Two-layer perceptron producing one logit per class.
///
/// `input -> Dense(hidden) -> ReLU -> Dropout -> Dense(n_classes)`.
/// Pair with `CrossEntropyLoss`, which applies the softmax.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    name: String,
    input_size: usize,
    net: Sequential,
}

impl MlpClassifier {
    pub fn new(
        name: impl Into<String>,
        input_size: usize,
        hidden: usize,
        n_classes: usize,
        dropout: f64,
        seed: u64,
    ) -> MlpClassifier {
        let mut rng = StdRng::seed_from_u64(seed);
        let net = Sequential::new(vec![
            Layer::Dense(Dense::new(input_size, hidden, &mut rng)),
            Layer::Activation(Activation::new(ActivationFunction::ReLU)),
            Layer::Dropout(Dropout::new(dropout, seed.wrapping_add(1))),
            Layer::Dense(Dense::new(hidden, n_classes, &mut rng)),
        ]);
        MlpClassifier { name: name.into(), input_size, net }
    }
}

impl Model for MlpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn forward(&mut self, input: &Matrix) -> Matrix {
        self.net.forward(input)
    }

    fn backward(&mut self, grad_output: &Matrix) {
        self.net.backward(grad_output)
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        self.net.params_mut()
    }

    fn set_training(&mut self, training: bool) {
        self.net.set_training(training)
    }

    fn is_training(&self) -> bool {
        self.net.is_training()
    }

    fn state(&self) -> ModelState {
        ModelState {
            architecture: ARCHITECTURE.to_string(),
            params: self.net.params().into_iter().map(|p| p.value.clone()).collect(),
        }
    }

    fn load_state(&mut self, state: &ModelState) -> Result<(), ModelError> {
        apply_state(ARCHITECTURE, self.net.params_mut(), state)
    }
}
