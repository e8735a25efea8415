use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::ModelError;
use crate::layers::{Activation, ActivationFunction, Dense, Layer, Param};
use crate::math::matrix::Matrix;
use crate::model::model::{apply_state, Model, ModelState};
use crate::model::sequential::Sequential;

const ARCHITECTURE: &str = "autoencoder";

/// Dense autoencoder reconstructing its own input through a bottleneck.
///
/// `input -> Dense(latent) -> Tanh -> Dense(input)`; train with
/// `MseLoss`, whose target is the batch input.
#[derive(Debug, Clone)]
pub struct Autoencoder {
    name: String,
    input_size: usize,
    net: Sequential,
}

impl Autoencoder {
    pub fn new(name: impl Into<String>, input_size: usize, latent: usize, seed: u64) -> Autoencoder {
        let mut rng = StdRng::seed_from_u64(seed);
        let net = Sequential::new(vec![
            Layer::Dense(Dense::new(input_size, latent, &mut rng)),
            Layer::Activation(Activation::new(ActivationFunction::Tanh)),
            Layer::Dense(Dense::new(latent, input_size, &mut rng)),
        ]);
        Autoencoder { name: name.into(), input_size, net }
    }
}

impl Model for Autoencoder {
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
