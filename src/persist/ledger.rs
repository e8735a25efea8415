use serde::{Serialize, Deserialize};

/// Current on-disk ledger layout.
///
/// Version 1 ledgers predate the patience fields and the split seed; they
/// load with those fields at their defaults.
pub const LEDGER_SCHEMA_VERSION: u32 = 2;

fn infinity() -> f64 {
    f64::INFINITY
}

fn schema_v1() -> u32 {
    1
}

/// Durable record of training progress, paired with the checkpoint of the
/// same model name.
///
/// Defaults for fields missing from older files:
/// - `best_valid_loss`: `+inf`
/// - `patience`: `None`, treated as matching the configured patience
/// - `patience_counter`: `None`, treated as 0
/// - `split_seed`: `None`, the configured seed is used
/// - histories: empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default = "schema_v1")]
    pub schema_version: u32,
    #[serde(default = "infinity", with = "finite_or_inf")]
    pub best_valid_loss: f64,
    #[serde(default)]
    pub best_valid_accuracy: Option<f64>,
    #[serde(default)]
    pub best_epoch: usize,
    /// Number of completed epochs.
    #[serde(default)]
    pub epochs: usize,
    /// Patience the run was configured with.
    #[serde(default)]
    pub patience: Option<usize>,
    /// Consecutive non-improving epochs at the time of writing.
    #[serde(default)]
    pub patience_counter: Option<usize>,
    #[serde(default)]
    pub split_seed: Option<u64>,
    #[serde(default, with = "nan_as_null")]
    pub train_loss: Vec<f64>,
    #[serde(default, with = "nan_as_null")]
    pub valid_loss: Vec<f64>,
    #[serde(default, with = "nan_as_null")]
    pub train_accuracy: Vec<f64>,
    #[serde(default, with = "nan_as_null")]
    pub valid_accuracy: Vec<f64>,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger {
            schema_version: LEDGER_SCHEMA_VERSION,
            best_valid_loss: f64::INFINITY,
            best_valid_accuracy: None,
            best_epoch: 0,
            epochs: 0,
            patience: None,
            patience_counter: None,
            split_seed: None,
            train_loss: Vec::new(),
            valid_loss: Vec::new(),
            train_accuracy: Vec::new(),
            valid_accuracy: Vec::new(),
        }
    }
}

impl Ledger {
    pub fn new(patience: usize, split_seed: Option<u64>) -> Ledger {
        Ledger { patience: Some(patience), patience_counter: Some(0), split_seed, ..Ledger::default() }
    }

    /// Appends the metrics of 1-based `epoch`.
    pub fn record_epoch(
        &mut self,
        epoch: usize,
        train_loss: f64,
        valid_loss: f64,
        train_accuracy: Option<f64>,
        valid_accuracy: Option<f64>,
    ) {
        self.epochs = epoch;
        self.train_loss.push(train_loss);
        self.valid_loss.push(valid_loss);
        if let Some(a) = train_accuracy {
            self.train_accuracy.push(a);
        }
        if let Some(a) = valid_accuracy {
            self.valid_accuracy.push(a);
        }
    }

    /// Brings an older ledger up to the current schema in memory.
    pub fn upgrade(mut self) -> Ledger {
        self.schema_version = LEDGER_SCHEMA_VERSION;
        self
    }
}

/// JSON has no infinity; an unset best loss is stored as `null`.
mod finite_or_inf {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

/// Histories may hold a diverged epoch; its non-finite loss is written as
/// `null` and read back as NaN.
mod nan_as_null {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&v.is_finite().then_some(*v))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(d)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_one_ledgers_load_with_defaults() {
        let old = r#"{
            "best_valid_loss": 0.41,
            "best_epoch": 3,
            "epochs": 5,
            "train_loss": [0.9, 0.7, 0.5, 0.45, 0.44],
            "valid_loss": [0.8, 0.6, 0.41, 0.42, 0.43]
        }"#;
        let ledger: Ledger = serde_json::from_str(old).unwrap();
        assert_eq!(ledger.schema_version, 1);
        assert_eq!(ledger.patience, None);
        assert_eq!(ledger.patience_counter, None);
        assert_eq!(ledger.split_seed, None);
        assert!(ledger.valid_accuracy.is_empty());
        assert_eq!(ledger.upgrade().schema_version, LEDGER_SCHEMA_VERSION);
    }

    #[test]
    fn unset_best_loss_survives_json() {
        let ledger = Ledger::new(20, Some(420));
        let json = serde_json::to_string(&ledger).unwrap();
        let back: Ledger = serde_json::from_str(&json).unwrap();
        assert!(back.best_valid_loss.is_infinite());
        assert_eq!(back, ledger);
    }

    #[test]
    fn diverged_epochs_stay_readable() {
        let mut ledger = Ledger::new(3, None);
        ledger.record_epoch(1, 0.5, 0.4, None, None);
        ledger.record_epoch(2, f64::NAN, f64::INFINITY, None, None);
        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("\"valid_loss\":[0.4,null]"));

        let back: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(back.train_loss[0], 0.5);
        assert!(back.train_loss[1].is_nan());
        assert!(back.valid_loss[1].is_nan());
        assert_eq!(back.epochs, 2);
    }
}
