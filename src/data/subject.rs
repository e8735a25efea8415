use serde::{Serialize, Deserialize};

/// One recorded segment of a subject's raw signal, `[begin, end)` in time
/// points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub begin: usize,
    pub end: usize,
}

impl Trial {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A data-contributing subject and the trials cut from its recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    /// Binary class label (e.g. sex), shared by all of the subject's trials.
    pub label: usize,
    /// Missing ages exclude the subject from every split.
    pub age: Option<f64>,
    pub trials: Vec<Trial>,
}

/// One trial of one subject, the unit the chunked loader reads on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRef {
    pub subject: String,
    pub label: usize,
    pub trial: Trial,
}

/// Flattens the trials of `subjects` in order.
pub fn trial_refs<'a, I>(subjects: I) -> Vec<TrialRef>
where
    I: IntoIterator<Item = &'a Subject>,
{
    subjects
        .into_iter()
        .flat_map(|s| {
            s.trials.iter().map(move |t| TrialRef {
                subject: s.id.clone(),
                label: s.label,
                trial: *t,
            })
        })
        .collect()
}
