use crate::data::loader::DataLoader;
use crate::error::TrainError;
use crate::loss::criterion::Criterion;
use crate::model::model::Model;

/// Sample-weighted metrics of one pass over a loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    /// `None` when the criterion has no accuracy metric.
    pub accuracy: Option<f64>,
    pub samples: usize,
}

/// Runs `model` over every batch of `loader` in inference mode, without
/// touching parameters.
///
/// Batch metrics are weighted by batch size, so a short last batch counts
/// for exactly its samples. The model's training flag is restored before
/// returning, on success and on error alike.
pub fn evaluate<M: Model + ?Sized>(
    model: &mut M,
    loader: &DataLoader,
    criterion: &dyn Criterion,
) -> Result<Evaluation, TrainError> {
    let was_training = model.is_training();
    model.set_training(false);
    let result = run(model, loader, criterion);
    model.set_training(was_training);
    result
}

fn run<M: Model + ?Sized>(
    model: &mut M,
    loader: &DataLoader,
    criterion: &dyn Criterion,
) -> Result<Evaluation, TrainError> {
    let mut samples = 0usize;
    let mut loss_sum = 0.0;
    let mut accuracy_sum = Some(0.0);

    for batch in loader {
        let n = batch.len();
        let output = model.forward(&batch.inputs);
        loss_sum += criterion.loss(&output, &batch) * n as f64;
        accuracy_sum = match (accuracy_sum, criterion.accuracy(&output, &batch)) {
            (Some(sum), Some(acc)) => Some(sum + acc * n as f64),
            _ => None,
        };
        samples += n;
    }

    if samples == 0 {
        return Err(TrainError::EmptyLoader(loader.name().to_string()));
    }
    Ok(Evaluation {
        loss: loss_sum / samples as f64,
        accuracy: accuracy_sum.map(|sum| sum / samples as f64),
        samples,
    })
}
