use crate::math::matrix::Matrix;

/// One preprocessed trial: a flat `[channels, sensors, bins]` tensor and its
/// class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<f64>,
    pub label: usize,
}

/// An ordered group of samples; one row of `inputs` per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Matrix,
    pub labels: Vec<usize>,
}

impl Batch {
    /// Stacks samples of `numel` features each.
    pub fn from_samples(samples: Vec<Sample>, numel: usize) -> Batch {
        let mut data = Vec::with_capacity(samples.len() * numel);
        let mut labels = Vec::with_capacity(samples.len());
        for sample in samples {
            debug_assert_eq!(sample.input.len(), numel);
            data.extend(sample.input);
            labels.push(sample.label);
        }
        Batch { inputs: Matrix::from_vec(labels.len(), numel, data), labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
