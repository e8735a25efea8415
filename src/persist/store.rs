use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::PersistError;
use crate::persist::checkpoint::Checkpoint;
use crate::persist::ledger::Ledger;

/// The on-disk checkpoint and ledger of one named model.
///
/// Files live at `{dir}/{model_name}.ckpt.json` and
/// `{dir}/{model_name}.ledger.json`. Each write goes to a sibling `.tmp`
/// file which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    model_name: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> CheckpointStore {
        CheckpointStore { dir: dir.into(), model_name: model_name.into() }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ckpt.json", self.model_name))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ledger.json", self.model_name))
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint_path().is_file()
    }

    /// Persists a new best state: the checkpoint first, then the ledger.
    pub fn save(&self, checkpoint: &Checkpoint, ledger: &Ledger) -> Result<(), PersistError> {
        write_json(&self.checkpoint_path(), checkpoint)?;
        self.save_ledger(ledger)
    }

    pub fn save_ledger(&self, ledger: &Ledger) -> Result<(), PersistError> {
        write_json(&self.ledger_path(), ledger)
    }

    pub fn load_checkpoint(&self) -> Result<Checkpoint, PersistError> {
        read_json(&self.checkpoint_path())
    }

    /// Loads the ledger, upgraded to the current schema version.
    pub fn load_ledger(&self) -> Result<Ledger, PersistError> {
        read_json::<Ledger>(&self.ledger_path()).map(Ledger::upgrade)
    }

    /// Deletes both files if present.
    pub fn clear(&self) -> Result<(), PersistError> {
        for path in [self.checkpoint_path(), self.ledger_path()] {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(PersistError::Io { path, source }),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = fs::File::create(&tmp).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|source| PersistError::Serialize { path: path.to_path_buf(), source })?;
    writer.flush().map_err(io_err)?;
    drop(writer);
    fs::rename(&tmp, path).map_err(io_err)?;
    debug!(path = %path.display(), "saved");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PersistError::NotFound(path.to_path_buf()));
        }
        Err(source) => return Err(PersistError::Io { path: path.to_path_buf(), source }),
    };
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| PersistError::Corrupt { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::model::ModelState;
    use crate::optim::optimizer::OptimizerState;
    use pretty_assertions::assert_eq;

    fn checkpoint(epoch: usize) -> Checkpoint {
        Checkpoint {
            epoch,
            model: ModelState { architecture: "mlp_classifier".into(), params: vec![vec![1.0, 2.0], vec![0.5]] },
            optimizer: OptimizerState::Sgd { learning_rate: 0.1 },
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "net");
        let mut ledger = Ledger::new(3, Some(7));
        ledger.record_epoch(1, 0.9, 0.8, Some(0.5), Some(0.6));
        ledger.best_valid_loss = 0.8;
        ledger.best_epoch = 1;

        store.save(&checkpoint(1), &ledger).unwrap();

        assert_eq!(store.load_checkpoint().unwrap(), checkpoint(1));
        assert_eq!(store.load_ledger().unwrap(), ledger);
        assert!(!dir.path().join("net.ckpt.json.tmp").exists());
    }

    #[test]
    fn missing_and_corrupt_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "net");
        assert!(matches!(store.load_checkpoint(), Err(PersistError::NotFound(_))));

        fs::write(store.checkpoint_path(), "{ not json").unwrap();
        assert!(matches!(store.load_checkpoint(), Err(PersistError::Corrupt { .. })));
    }

    #[test]
    fn clear_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "net");
        store.save_ledger(&Ledger::default()).unwrap();
        store.clear().unwrap();
        assert!(!store.ledger_path().exists());
        store.clear().unwrap();
    }
}
