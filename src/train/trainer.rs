use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::data::batch::Batch;
use crate::data::loader::DataLoader;
use crate::error::{PersistError, TrainError};
use crate::loss::criterion::Criterion;
use crate::model::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::persist::{Checkpoint, CheckpointStore, Ledger};
use crate::train::epoch_stats::EpochStats;
use crate::train::evaluate::{evaluate, Evaluation};
use crate::train::train_config::{ResumePolicy, TrainerConfig};

/// Batches timed by `Trainer::time_epoch` before projecting a full epoch.
pub const TIMING_BATCHES: usize = 1000;

/// Where a trainer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// Nothing trained or restored yet.
    Fresh,
    /// Restored from a checkpoint and ledger, not yet trained further.
    Resumed,
    /// Inside an epoch.
    Training,
    /// The last epoch improved validation loss and was checkpointed.
    Converged,
    /// Patience ran out; `fit` has returned.
    StoppedByPatience,
    /// `max_epochs` was reached before patience ran out.
    ReachedEpochLimit,
}

/// Outcome of `Trainer::fit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// 1-based epoch with the lowest validation loss so far (0 if none).
    pub best_epoch: usize,
    pub best_valid_loss: f64,
    /// Epochs run by this call, excluding any restored from disk.
    pub epochs_run: usize,
    pub state: TrainerState,
}

/// Outcome of `Trainer::time_epoch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingReport {
    pub batches: usize,
    pub per_batch: Duration,
    /// `per_batch` scaled to the loader's full batch count.
    pub projected_epoch: Duration,
}

/// Patience-driven training loop with checkpointing and resume.
///
/// The trainer owns the model, optimizer and criterion for its lifetime.
/// Without a `CheckpointStore` nothing is written to disk.
pub struct Trainer<M: Model + ?Sized = dyn Model> {
    model: Box<M>,
    optimizer: Box<dyn Optimizer>,
    criterion: Box<dyn Criterion>,
    config: TrainerConfig,
    store: Option<CheckpointStore>,
    ledger: Ledger,
    state: TrainerState,
    epoch: usize,
    patience_counter: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl<M: Model + ?Sized> Trainer<M> {
    /// A fresh trainer. `split_seed` is recorded in the ledger so a resumed
    /// run can rebuild the same subject split.
    pub fn new(
        model: Box<M>,
        optimizer: Box<dyn Optimizer>,
        criterion: Box<dyn Criterion>,
        config: TrainerConfig,
        store: Option<CheckpointStore>,
        split_seed: Option<u64>,
    ) -> Self {
        Trainer {
            model,
            optimizer,
            criterion,
            ledger: Ledger::new(config.patience, split_seed),
            config,
            store,
            state: TrainerState::Fresh,
            epoch: 0,
            patience_counter: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn criterion(&self) -> &dyn Criterion {
        self.criterion.as_ref()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Last completed epoch.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn best_valid_loss(&self) -> f64 {
        self.ledger.best_valid_loss
    }

    pub fn patience_counter(&self) -> usize {
        self.patience_counter
    }

    /// Restores model, optimizer and progress from the store.
    ///
    /// Fails without side effects if the checkpoint is missing or corrupt,
    /// or if the ledger's patience differs from the configured one under
    /// `ResumePolicy::Abort`. A missing ledger is rebuilt from the
    /// checkpoint's epoch with an unknown best loss.
    pub fn resume(&mut self) -> Result<(), TrainError> {
        let store = self.store.as_ref().ok_or(TrainError::NoStore)?;
        let checkpoint = store.load_checkpoint()?;
        let mut ledger = match store.load_ledger() {
            Ok(ledger) => ledger,
            Err(PersistError::NotFound(path)) => {
                warn!("no ledger at {}; continuing from checkpoint epoch {}", path.display(), checkpoint.epoch);
                Ledger {
                    epochs: checkpoint.epoch,
                    best_epoch: checkpoint.epoch,
                    ..Ledger::new(self.config.patience, self.ledger.split_seed)
                }
            }
            Err(e) => return Err(e.into()),
        };

        let configured = self.config.patience;
        let saved = ledger.patience.unwrap_or(configured);
        let restored_counter = ledger.patience_counter.unwrap_or(0);
        let counter = match self.config.resume_policy {
            ResumePolicy::Abort if saved != configured => {
                return Err(TrainError::PatienceMismatch { configured, checkpointed: saved });
            }
            ResumePolicy::Abort => restored_counter,
            ResumePolicy::ForceContinue => {
                if saved != configured {
                    warn!(
                        "checkpointed patience {saved} differs from configured patience {configured}; \
                         continuing with {configured} and counter {restored_counter}"
                    );
                }
                restored_counter
            }
            ResumePolicy::ResetPatience => {
                info!("resetting patience counter (was {restored_counter})");
                0
            }
        };

        self.model.load_state(&checkpoint.model)?;
        let sizes: Vec<usize> = self.model.params_mut().iter().map(|p| p.len()).collect();
        self.optimizer.load_state(&checkpoint.optimizer, &sizes)?;

        ledger.patience = Some(configured);
        ledger.patience_counter = Some(counter);
        if ledger.split_seed.is_none() {
            ledger.split_seed = self.ledger.split_seed;
        }
        self.epoch = checkpoint.epoch.max(ledger.epochs);
        self.patience_counter = counter;
        self.ledger = ledger;
        self.state = TrainerState::Resumed;

        info!(
            epoch = self.epoch,
            best_epoch = self.ledger.best_epoch,
            best_valid_loss = self.ledger.best_valid_loss,
            patience_counter = counter,
            "resumed training"
        );
        Ok(())
    }

    /// Trains until `patience` consecutive epochs fail to improve the
    /// validation loss, or until epoch `max_epochs` if one is set.
    ///
    /// The best model is persisted (when a store is configured); the
    /// in-memory model is the last one trained. Call `restore_best` to
    /// bring back the best weights.
    pub fn fit(&mut self, train: &DataLoader, valid: &DataLoader) -> Result<FitReport, TrainError> {
        if train.is_empty() {
            return Err(TrainError::EmptyLoader(train.name().to_string()));
        }
        let start_epoch = self.epoch;
        info!(
            train_batches = train.len(),
            valid_batches = valid.len(),
            patience = self.config.patience,
            "starting training at epoch {}",
            self.epoch + 1
        );

        let mut final_state = TrainerState::StoppedByPatience;
        while self.patience_counter < self.config.patience {
            if self.config.max_epochs.is_some_and(|max| self.epoch >= max) {
                final_state = TrainerState::ReachedEpochLimit;
                break;
            }
            self.epoch += 1;
            self.state = TrainerState::Training;
            let started = Instant::now();

            self.train_epoch(train);
            let train_eval = evaluate(self.model.as_mut(), train, self.criterion.as_ref())?;
            let valid_eval = evaluate(self.model.as_mut(), valid, self.criterion.as_ref())?;

            self.ledger.record_epoch(
                self.epoch,
                train_eval.loss,
                valid_eval.loss,
                train_eval.accuracy,
                valid_eval.accuracy,
            );

            let improved = valid_eval.loss < self.ledger.best_valid_loss;
            if improved {
                self.patience_counter = 0;
                self.ledger.best_valid_loss = valid_eval.loss;
                self.ledger.best_valid_accuracy = valid_eval.accuracy;
                self.ledger.best_epoch = self.epoch;
            } else {
                self.patience_counter += 1;
            }
            self.ledger.patience_counter = Some(self.patience_counter);

            if let Some(store) = &self.store {
                if improved {
                    store.save(&self.checkpoint(), &self.ledger)?;
                } else {
                    store.save_ledger(&self.ledger)?;
                }
            }
            if improved {
                self.state = TrainerState::Converged;
            }

            EpochStats {
                epoch: self.epoch,
                train_loss: train_eval.loss,
                valid_loss: valid_eval.loss,
                train_accuracy: train_eval.accuracy,
                valid_accuracy: valid_eval.accuracy,
                improved,
                patience_counter: self.patience_counter,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
            .log();
        }

        self.state = final_state;
        if final_state == TrainerState::ReachedEpochLimit {
            info!(best_epoch = self.ledger.best_epoch, "stopped at the epoch limit ({})", self.epoch);
        } else {
            info!(
                best_epoch = self.ledger.best_epoch,
                best_valid_loss = self.ledger.best_valid_loss,
                "stopped after {} epochs without improvement",
                self.config.patience
            );
        }
        Ok(FitReport {
            best_epoch: self.ledger.best_epoch,
            best_valid_loss: self.ledger.best_valid_loss,
            epochs_run: self.epoch - start_epoch,
            state: self.state,
        })
    }

    /// Times training steps over the start of one epoch and projects the
    /// duration of a full one. Parameters are updated as in `fit`, but
    /// nothing is evaluated or persisted.
    pub fn time_epoch(&mut self, train: &DataLoader) -> Result<TimingReport, TrainError> {
        if train.is_empty() {
            return Err(TrainError::EmptyLoader(train.name().to_string()));
        }
        self.model.set_training(true);
        let started = Instant::now();
        let mut batches = 0usize;
        for batch in train.iter().take(TIMING_BATCHES) {
            self.train_step(&batch);
            batches += 1;
        }
        let elapsed = started.elapsed();
        let per_batch = elapsed / batches.max(1) as u32;
        let projected_epoch = per_batch * train.len() as u32;
        info!(
            batches,
            "{:.3?} per batch, projected {:.1?} per epoch of {} batches",
            per_batch,
            projected_epoch,
            train.len()
        );
        Ok(TimingReport { batches, per_batch, projected_epoch })
    }

    /// Scores the current model on `loader` with the trainer's criterion.
    pub fn evaluate(&mut self, loader: &DataLoader) -> Result<Evaluation, TrainError> {
        evaluate(self.model.as_mut(), loader, self.criterion.as_ref())
    }

    /// Loads the persisted best checkpoint into the model and returns its
    /// epoch.
    pub fn restore_best(&mut self) -> Result<usize, TrainError> {
        let store = self.store.as_ref().ok_or(TrainError::NoStore)?;
        let checkpoint = store.load_checkpoint()?;
        self.model.load_state(&checkpoint.model)?;
        info!(epoch = checkpoint.epoch, "restored best checkpoint");
        Ok(checkpoint.epoch)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

impl<M: Model + ?Sized> Trainer<M> {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint { epoch: self.epoch, model: self.model.state(), optimizer: self.optimizer.state() }
    }

    /// One pass of optimizer steps over `train`, logging every tenth of it.
    fn train_epoch(&mut self, train: &DataLoader) {
        self.model.set_training(true);
        let total = train.len();
        let every = (total / 10).max(1);
        let mut running = 0.0;
        let mut seen = 0usize;
        for (i, batch) in train.iter().enumerate() {
            running += self.train_step(&batch) * batch.len() as f64;
            seen += batch.len();
            if (i + 1) % every == 0 {
                info!(
                    epoch = self.epoch,
                    "batch {}/{} ({:.0}%), running loss {:.4}",
                    i + 1,
                    total,
                    100.0 * (i + 1) as f64 / total as f64,
                    running / seen.max(1) as f64
                );
            }
        }
        debug!(epoch = self.epoch, samples = seen, "epoch updates done");
    }

    /// zero grads, forward, loss, backward, step. Returns the batch loss.
    fn train_step(&mut self, batch: &Batch) -> f64 {
        self.model.zero_grad();
        let output = self.model.forward(&batch.inputs);
        let loss = self.criterion.loss(&output, batch);
        let grad = self.criterion.gradient(&output, batch);
        self.model.backward(&grad);
        self.optimizer.step(self.model.params_mut());
        loss
    }
}
