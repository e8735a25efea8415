use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use ferrite_meg::data::{Batch, DataLoader, Sample, SampleShape, SampleSource};
use ferrite_meg::error::{DataError, ModelError, PersistError, TrainError};
use ferrite_meg::layers::Param;
use ferrite_meg::loss::Criterion;
use ferrite_meg::model::{Model, ModelState};
use ferrite_meg::optim::Sgd;
use ferrite_meg::persist::CheckpointStore;
use ferrite_meg::{Matrix, ResumePolicy, Trainer, TrainerConfig, TrainerState};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// One scalar parameter that grows by exactly 1 per optimizer step under
/// `Sgd { learning_rate: 1.0 }`; its output is that parameter, so after `k`
/// training batches the model "is" epoch `k`.
struct Counter {
    param: Param,
    training: bool,
}

impl Counter {
    fn new() -> Counter {
        Counter { param: Param::new(vec![0.0]), training: true }
    }

    fn value(&self) -> f64 {
        self.param.value[0]
    }
}

impl Model for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn input_size(&self) -> usize {
        1
    }

    fn forward(&mut self, input: &Matrix) -> Matrix {
        Matrix::from_vec(input.rows, 1, vec![self.param.value[0]; input.rows])
    }

    fn backward(&mut self, _grad_output: &Matrix) {
        self.param.grad[0] -= 1.0;
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.param]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn state(&self) -> ModelState {
        ModelState { architecture: "counter".into(), params: vec![self.param.value.clone()] }
    }

    fn load_state(&mut self, state: &ModelState) -> Result<(), ModelError> {
        if state.architecture != "counter" {
            return Err(ModelError::Architecture { saved: state.architecture.clone(), current: "counter".into() });
        }
        self.param.value = state.params[0].clone();
        Ok(())
    }
}

/// Reports `losses[k - 1]` for a model output of `k`; outputs past the end
/// repeat the last entry.
struct Schedule(Vec<f64>);

impl Criterion for Schedule {
    fn loss(&self, output: &Matrix, _batch: &Batch) -> f64 {
        let k = output.get(0, 0).round() as usize;
        if k == 0 {
            return f64::MAX;
        }
        self.0[(k - 1).min(self.0.len() - 1)]
    }

    fn gradient(&self, output: &Matrix, _batch: &Batch) -> Matrix {
        Matrix::zeros(output.rows, output.cols)
    }
}

struct Single;

impl SampleSource for Single {
    fn len(&self) -> usize {
        1
    }

    fn shape(&self) -> SampleShape {
        SampleShape { channels: 1, sensors: 1, bins: 1 }
    }

    fn get(&self, _index: usize) -> Result<Sample, DataError> {
        Ok(Sample { input: vec![0.0], label: 0 })
    }
}

fn loader() -> DataLoader {
    DataLoader::new("single", Arc::new(Single), 1, 0)
}

fn trainer(losses: &[f64], config: TrainerConfig, store: Option<CheckpointStore>) -> Trainer<Counter> {
    Trainer::new(
        Box::new(Counter::new()),
        Box::new(Sgd::new(1.0)),
        Box::new(Schedule(losses.to_vec())),
        config,
        store,
        Some(420),
    )
}

const SCENARIO: [f64; 5] = [0.5, 0.4, 0.45, 0.46, 0.47];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn stops_patience_epochs_after_the_best_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "counter");
    let mut t = trainer(&SCENARIO, TrainerConfig::new(3), Some(store.clone()));
    assert_eq!(t.state(), TrainerState::Fresh);

    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!(report.best_epoch, 2);
    assert_eq!(report.best_valid_loss, 0.4);
    assert_eq!(report.epochs_run, 5);
    assert_eq!(report.state, TrainerState::StoppedByPatience);
    assert_eq!(t.model().value(), 5.0);

    let checkpoint = store.load_checkpoint().unwrap();
    assert_eq!(checkpoint.epoch, 2);
    assert_eq!(checkpoint.model.params, vec![vec![2.0]]);

    let ledger = store.load_ledger().unwrap();
    assert_eq!(ledger.epochs, 5);
    assert_eq!(ledger.best_epoch, 2);
    assert_eq!(ledger.valid_loss, SCENARIO.to_vec());
    assert_eq!(ledger.patience, Some(3));
    assert_eq!(ledger.patience_counter, Some(3));
    assert_eq!(ledger.split_seed, Some(420));
    assert!(ledger.valid_accuracy.is_empty());

    assert_eq!(t.restore_best().unwrap(), 2);
    assert_eq!(t.model().value(), 2.0);
}

#[test]
fn every_stop_is_exactly_patience_after_the_last_improvement() {
    let losses = [0.9, 0.8, 0.85, 0.7, 0.75, 0.72, 0.71, 0.8];
    for patience in 1..=4 {
        let mut t = trainer(&losses, TrainerConfig::new(patience), None);
        let report = t.fit(&loader(), &loader()).unwrap();
        assert_eq!(report.epochs_run, report.best_epoch + patience, "patience {patience}");
    }
}

#[test]
fn empty_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut t = trainer(&SCENARIO, TrainerConfig::new(3), None);
    t.fit(&loader(), &loader()).unwrap();
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(matches!(t.restore_best(), Err(TrainError::NoStore)));
}

/// Trains `[0.5, 0.4, 0.45, 0.46]` with patience 2: best epoch 2, stopped
/// after epoch 4 with the counter at 2.
fn interrupted_run(dir: &std::path::Path) -> CheckpointStore {
    let store = CheckpointStore::new(dir, "counter");
    let mut t = trainer(&SCENARIO[..4], TrainerConfig::new(2), Some(store.clone()));
    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!((report.best_epoch, report.epochs_run), (2, 4));
    store
}

#[test]
fn resume_restores_epoch_best_loss_and_counter() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());

    let mut t = trainer(&SCENARIO, TrainerConfig::new(2), Some(store));
    t.resume().unwrap();
    assert_eq!(t.state(), TrainerState::Resumed);
    assert_eq!(t.epoch(), 4);
    assert_eq!(t.best_valid_loss(), 0.4);
    assert_eq!(t.patience_counter(), 2);
    assert_eq!(t.model().value(), 2.0);

    // Patience is already exhausted: nothing more to run.
    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!(report.epochs_run, 0);
    assert_eq!(report.best_epoch, 2);
}

#[test]
fn reset_patience_zeroes_only_the_counter() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());

    let config = TrainerConfig::new(2).with_resume_policy(ResumePolicy::ResetPatience);
    let mut t = trainer(&SCENARIO, config, Some(store.clone()));
    t.resume().unwrap();
    assert_eq!((t.epoch(), t.best_valid_loss(), t.patience_counter()), (4, 0.4, 0));

    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!(report.epochs_run, 2);
    assert_eq!(t.epoch(), 6);
    assert_eq!(store.load_ledger().unwrap().epochs, 6);
    assert_eq!(store.load_checkpoint().unwrap().epoch, 2);
}

#[test]
fn patience_mismatch_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());
    let checkpoint_before = fs::read(store.checkpoint_path()).unwrap();
    let ledger_before = fs::read(store.ledger_path()).unwrap();

    let mut t = trainer(&SCENARIO, TrainerConfig::new(5), Some(store.clone()));
    let err = t.resume().unwrap_err();
    assert!(matches!(err, TrainError::PatienceMismatch { configured: 5, checkpointed: 2 }));
    assert_eq!(t.state(), TrainerState::Fresh);
    assert_eq!(t.model().value(), 0.0);

    assert_eq!(fs::read(store.checkpoint_path()).unwrap(), checkpoint_before);
    assert_eq!(fs::read(store.ledger_path()).unwrap(), ledger_before);
}

#[test]
fn force_continue_keeps_the_counter_under_the_new_patience() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());

    let config = TrainerConfig::new(5).with_resume_policy(ResumePolicy::ForceContinue);
    let mut t = trainer(&SCENARIO, config, Some(store.clone()));
    t.resume().unwrap();
    assert_eq!(t.patience_counter(), 2);

    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!(report.epochs_run, 3);
    assert_eq!(store.load_ledger().unwrap().patience, Some(5));
}

#[test]
fn corrupt_or_missing_checkpoint_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "counter");

    let mut t = trainer(&SCENARIO, TrainerConfig::new(3), Some(store.clone()));
    assert!(matches!(t.resume(), Err(TrainError::Persist(PersistError::NotFound(_)))));

    fs::write(store.checkpoint_path(), b"\x00\x01 definitely not json").unwrap();
    assert!(matches!(t.resume(), Err(TrainError::Persist(PersistError::Corrupt { .. }))));
    assert_eq!(t.state(), TrainerState::Fresh);
}

#[test]
fn timing_stops_at_the_last_batch() {
    let mut t = trainer(&SCENARIO, TrainerConfig::new(3), None);
    let wide = DataLoader::new("five", Arc::new(Repeat(5)), 2, 0);
    let report = t.time_epoch(&wide).unwrap();
    assert_eq!(report.batches, 3);
    assert_eq!(t.model().value(), 3.0);
    assert_eq!(t.epoch(), 0);
}

struct Repeat(usize);

impl SampleSource for Repeat {
    fn len(&self) -> usize {
        self.0
    }

    fn shape(&self) -> SampleShape {
        SampleShape { channels: 1, sensors: 1, bins: 1 }
    }

    fn get(&self, index: usize) -> Result<Sample, DataError> {
        Ok(Sample { input: vec![index as f64], label: 0 })
    }
}

#[test]
fn empty_training_loader_is_an_error() {
    let mut t = trainer(&SCENARIO, TrainerConfig::new(3), None);
    let empty = DataLoader::new("train", Arc::new(Repeat(0)), 4, 0);
    assert!(matches!(t.fit(&empty, &loader()), Err(TrainError::EmptyLoader(name)) if name == "train"));
}

#[test]
fn epoch_limit_stops_before_patience() {
    let losses = [0.9, 0.8, 0.7, 0.6, 0.5];
    let config = TrainerConfig::new(3).with_max_epochs(Some(3));
    let mut t = trainer(&losses, config, None);
    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!(report.epochs_run, 3);
    assert_eq!(report.best_epoch, 3);
    assert_eq!(report.state, TrainerState::ReachedEpochLimit);
}

#[test]
fn diverged_epoch_leaves_a_resumable_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "counter");
    let losses = [0.5, f64::NAN];
    let mut t = trainer(&losses, TrainerConfig::new(1), Some(store.clone()));
    let report = t.fit(&loader(), &loader()).unwrap();
    assert_eq!((report.best_epoch, report.epochs_run), (1, 2));

    let ledger = store.load_ledger().unwrap();
    assert_eq!(ledger.valid_loss[0], 0.5);
    assert!(ledger.valid_loss[1].is_nan());

    let mut resumed = trainer(&losses, TrainerConfig::new(1), Some(store));
    resumed.resume().unwrap();
    assert_eq!(resumed.epoch(), 2);
    assert_eq!(resumed.best_valid_loss(), 0.5);
    assert_eq!(resumed.patience_counter(), 1);
}
