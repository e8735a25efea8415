//! End-to-end run pipeline: subjects, split, loaders, model, training and
//! test evaluation for each `RunMode`.

use tracing::{info, warn};

use crate::config::{RunConfig, RunMode};
use crate::data::loader::DataLoader;
use crate::data::manifest::load_subjects;
use crate::data::partition::{partition, Split, SplitAssignment};
use crate::data::subject::Subject;
use crate::data::transform::Preprocessor;
use crate::data::{build_source, trials_for_split};
use crate::error::{PersistError, Result};
use crate::loss::{Criterion, CrossEntropyLoss, MseLoss};
use crate::model::{build_model, ModelKind};
use crate::optim::build_optimizer;
use crate::persist::{CheckpointStore, Ledger};
use crate::train::{Evaluation, FitReport, TimingReport, Trainer};

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub split_seed: u64,
    pub fit: Option<FitReport>,
    pub timing: Option<TimingReport>,
    pub test: Option<Evaluation>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Executes one run as described by `config`.
pub fn run(config: &RunConfig) -> Result<RunOutcome> {
    config.validate()?;
    let store = CheckpointStore::new(&config.save_dir, &config.model_name);

    let saved_ledger = if config.mode.reuses_saved_split() {
        match store.load_ledger() {
            Ok(ledger) => Some(ledger),
            Err(PersistError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };
    let split_seed = resolve_split_seed(config, saved_ledger.as_ref());

    let subjects = load_subjects(&config.data_dir)?;
    let assignment = partition(&subjects, &config.split_config(split_seed))?;
    let pipeline = Pipeline { config, subjects: &subjects, assignment: &assignment, split_seed };

    let mut outcome = RunOutcome { mode: config.mode, split_seed, fit: None, timing: None, test: None };

    if config.timing {
        let train = pipeline.loader(Split::Train);
        let mut trainer = pipeline.trainer(&train, None);
        outcome.timing = Some(trainer.time_epoch(&train)?);
        return Ok(outcome);
    }

    match config.mode {
        RunMode::Evaluate => {
            if !store.has_checkpoint() {
                return Err(PersistError::NotFound(store.checkpoint_path()).into());
            }
            let test = pipeline.loader(Split::Test);
            let mut trainer = pipeline.trainer(&test, Some(store));
            trainer.restore_best()?;
            outcome.test = Some(score(&mut trainer, &test)?);
        }
        RunMode::EmptyRun => {
            let (train, valid, test) = pipeline.all_loaders();
            let mut trainer = pipeline.trainer(&train, None);
            outcome.fit = Some(trainer.fit(&train, &valid)?);
            outcome.test = Some(score(&mut trainer, &test)?);
        }
        RunMode::Overwrite | RunMode::Continue => {
            let (train, valid, test) = pipeline.all_loaders();
            let resume = config.mode == RunMode::Continue && store.has_checkpoint();
            if config.mode == RunMode::Continue && !resume {
                warn!("no checkpoint at {}; starting fresh", store.checkpoint_path().display());
            }
            if !resume {
                store.clear()?;
            }
            let mut trainer = pipeline.trainer(&train, Some(store));
            if resume {
                trainer.resume()?;
            }
            outcome.fit = Some(trainer.fit(&train, &valid)?);
            if outcome.fit.is_some_and(|f| f.best_epoch > 0) {
                trainer.restore_best()?;
            } else {
                warn!("no epoch improved on the initial loss; testing the last model");
            }
            outcome.test = Some(score(&mut trainer, &test)?);
        }
    }
    Ok(outcome)
}

/// The seed used for the subject split: a seed recorded by a previous run
/// wins in modes that pick that run back up.
pub fn resolve_split_seed(config: &RunConfig, saved: Option<&Ledger>) -> u64 {
    match saved.and_then(|l| l.split_seed) {
        Some(seed) if config.mode.reuses_saved_split() => {
            if seed != config.seed {
                info!("using split seed {seed} recorded by the saved run instead of configured seed {}", config.seed);
            }
            seed
        }
        _ => config.seed,
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

struct Pipeline<'a> {
    config: &'a RunConfig,
    subjects: &'a [Subject],
    assignment: &'a SplitAssignment,
    split_seed: u64,
}

impl Pipeline<'_> {
    fn loader(&self, split: Split) -> DataLoader {
        let config = self.config;
        let shuffle_seed = config.shuffle.then_some(self.split_seed);
        let trials = trials_for_split(self.assignment, split, self.subjects, shuffle_seed);
        let pre = Preprocessor::new(config.channel, config.feature);
        let source = build_source(config.loading, &config.data_dir, trials, pre);
        if source.is_empty() {
            warn!("{} split has no samples", split.as_str());
        }
        info!(split = split.as_str(), samples = source.len(), shape = ?source.shape(), "built loader");
        DataLoader::new(split.as_str(), source, config.batch_size, config.num_workers)
    }

    fn all_loaders(&self) -> (DataLoader, DataLoader, DataLoader) {
        (self.loader(Split::Train), self.loader(Split::Valid), self.loader(Split::Test))
    }

    fn n_classes(&self) -> usize {
        self.subjects.iter().map(|s| s.label + 1).max().unwrap_or(0).max(2)
    }

    /// Model sized from `reference`'s sample shape, with the configured
    /// optimizer and the criterion matching the model kind.
    fn trainer(&self, reference: &DataLoader, store: Option<CheckpointStore>) -> Trainer {
        let config = self.config;
        let spec = config.model_spec(reference.shape().numel(), self.n_classes());
        let model = build_model(&spec);
        let criterion: Box<dyn Criterion> = match config.model {
            ModelKind::Classifier => Box::new(CrossEntropyLoss),
            ModelKind::Autoencoder => Box::new(MseLoss),
        };
        info!(model = ?config.model, input_size = spec.input_size, hidden = spec.hidden, "built model");
        Trainer::new(
            model,
            build_optimizer(config.optimizer, config.learning_rate),
            criterion,
            config.trainer_config(),
            store,
            Some(self.split_seed),
        )
    }
}

fn score(trainer: &mut Trainer, test: &DataLoader) -> Result<Evaluation> {
    let result = trainer.evaluate(test)?;
    match result.accuracy {
        Some(acc) => info!(samples = result.samples, "test loss {:.4}, accuracy {:.2}%", result.loss, acc * 100.0),
        None => info!(samples = result.samples, "test loss {:.4}", result.loss),
    }
    Ok(result)
}
