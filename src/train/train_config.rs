use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::ConfigError;

/// What to do when a resumed ledger was written with a different patience
/// than the one configured now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Refuse to resume on a patience mismatch.
    #[default]
    Abort,
    /// Use the configured patience with the restored counter.
    ForceContinue,
    /// Restore everything but start the patience counter from zero.
    ResetPatience,
}

impl FromStr for ResumePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "abort" => Ok(ResumePolicy::Abort),
            "force-continue" => Ok(ResumePolicy::ForceContinue),
            "reset-patience" => Ok(ResumePolicy::ResetPatience),
            _ => Err(ConfigError::UnknownToken {
                kind: "resume policy",
                value: s.to_string(),
                expected: "abort, force-continue, reset-patience",
            }),
        }
    }
}

/// Configuration for a `Trainer`.
///
/// # Fields
/// - `patience`: epochs without validation improvement before stopping
/// - `resume_policy`: handling of a patience mismatch on resume
/// - `max_epochs`: optional hard cap on the total epoch count, counted
///   across resumed runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerConfig {
    pub patience: usize,
    pub resume_policy: ResumePolicy,
    pub max_epochs: Option<usize>,
}

impl TrainerConfig {
    pub fn new(patience: usize) -> Self {
        TrainerConfig { patience, resume_policy: ResumePolicy::default(), max_epochs: None }
    }

    pub fn with_max_epochs(mut self, max_epochs: Option<usize>) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_tokens() {
        assert_eq!("abort".parse::<ResumePolicy>().unwrap(), ResumePolicy::Abort);
        assert_eq!("Force_Continue".parse::<ResumePolicy>().unwrap(), ResumePolicy::ForceContinue);
        assert_eq!("reset-patience".parse::<ResumePolicy>().unwrap(), ResumePolicy::ResetPatience);
        assert!("keep-going".parse::<ResumePolicy>().is_err());
    }
}
