//! Subject tables.
//!
//! Two UTF-8, comma-separated files with a header row live in the data
//! directory:
//! - `trials.csv`: columns `subs, sex, begin, end`, one row per trial
//! - `participants.csv`: columns `subs, age` (other columns ignored)
//!
//! Double-quoted fields with embedded commas are handled.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::data::subject::{Subject, Trial};
use crate::error::DataError;

pub const TRIALS_FILE: &str = "trials.csv";
pub const PARTICIPANTS_FILE: &str = "participants.csv";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reads both tables from `data_dir` and joins them into subjects, in order
/// of first appearance in the trial table.
///
/// Subjects absent from the participant table get `age = None`.
pub fn load_subjects(data_dir: &Path) -> Result<Vec<Subject>, DataError> {
    let trials_path = data_dir.join(TRIALS_FILE);
    let participants_path = data_dir.join(PARTICIPANTS_FILE);

    let trials_text = std::fs::read_to_string(&trials_path)
        .map_err(|e| DataError::io(&trials_path, e))?;
    let participants_text = std::fs::read_to_string(&participants_path)
        .map_err(|e| DataError::io(&participants_path, e))?;

    let ages = parse_participants(&participants_text, &participants_path)?;
    let mut subjects = parse_trials(&trials_text, &trials_path)?;
    for subject in &mut subjects {
        subject.age = ages.get(&subject.id).copied().flatten();
    }

    debug!(
        subjects = subjects.len(),
        trials = subjects.iter().map(|s| s.trials.len()).sum::<usize>(),
        "loaded subject manifest"
    );
    Ok(subjects)
}

/// Parses the trial table; subjects are grouped in first-appearance order.
pub fn parse_trials(text: &str, path: &Path) -> Result<Vec<Subject>, DataError> {
    let table = Table::parse(text, path)?;
    let subs = table.column("subs")?;
    let sex = table.column("sex")?;
    let begin = table.column("begin")?;
    let end = table.column("end")?;

    let mut subjects: Vec<Subject> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row_num, cells) in table.rows() {
        let id = cells[subs].trim().to_string();
        let label = table.parse_usize(&cells[sex], row_num, "sex")?;
        let trial = Trial {
            begin: table.parse_usize(&cells[begin], row_num, "begin")?,
            end: table.parse_usize(&cells[end], row_num, "end")?,
        };
        if trial.is_empty() {
            return Err(table.error(row_num, format!("empty trial [{}, {})", trial.begin, trial.end)));
        }

        match index.get(&id) {
            Some(&i) => {
                if subjects[i].label != label {
                    return Err(table.error(
                        row_num,
                        format!("subject {id} has conflicting labels {} and {label}", subjects[i].label),
                    ));
                }
                subjects[i].trials.push(trial);
            }
            None => {
                index.insert(id.clone(), subjects.len());
                subjects.push(Subject { id, label, age: None, trials: vec![trial] });
            }
        }
    }
    Ok(subjects)
}

/// Parses the participant table into `id -> age`; empty or `NaN` ages map to
/// `None`.
pub fn parse_participants(text: &str, path: &Path) -> Result<HashMap<String, Option<f64>>, DataError> {
    let table = Table::parse(text, path)?;
    let subs = table.column("subs")?;
    let age = table.column("age")?;

    let mut ages = HashMap::new();
    for (row_num, cells) in table.rows() {
        let raw = cells[age].trim();
        let value = if raw.is_empty() {
            None
        } else {
            let v: f64 = raw
                .parse()
                .map_err(|_| table.error(row_num, format!("age '{raw}' is not a valid number")))?;
            if v.is_nan() { None } else { Some(v) }
        };
        ages.insert(cells[subs].trim().to_string(), value);
    }
    Ok(ages)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

struct Table<'a> {
    path: &'a Path,
    header: Vec<String>,
    /// (1-based line number, cells)
    body: Vec<(usize, Vec<String>)>,
}

impl<'a> Table<'a> {
    fn parse(text: &str, path: &'a Path) -> Result<Table<'a>, DataError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let header: Vec<String> = match lines.next() {
            Some((_, line)) => parse_csv_row(line).into_iter().map(|c| c.trim().to_string()).collect(),
            None => {
                return Err(DataError::Table { path: path.into(), row: 0, reason: "table is empty".into() })
            }
        };

        let mut body = Vec::new();
        for (row_num, line) in lines {
            let cells = parse_csv_row(line);
            if cells.len() < header.len() {
                return Err(DataError::Table {
                    path: path.into(),
                    row: row_num,
                    reason: format!("expected {} columns, got {}", header.len(), cells.len()),
                });
            }
            body.push((row_num, cells));
        }
        Ok(Table { path, header, body })
    }

    fn column(&self, name: &str) -> Result<usize, DataError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| self.error(1, format!("missing column '{name}'")))
    }

    fn rows(&self) -> impl Iterator<Item = (usize, &Vec<String>)> {
        self.body.iter().map(|(n, cells)| (*n, cells))
    }

    fn parse_usize(&self, cell: &str, row: usize, what: &str) -> Result<usize, DataError> {
        let t = cell.trim();
        // Tables exported from dataframes sometimes carry integral floats.
        t.parse::<usize>()
            .ok()
            .or_else(|| t.parse::<f64>().ok().filter(|v| v.fract() == 0.0 && *v >= 0.0).map(|v| v as usize))
            .ok_or_else(|| self.error(row, format!("{what} '{t}' is not a non-negative integer")))
    }

    fn error(&self, row: usize, reason: String) -> DataError {
        DataError::Table { path: self.path.into(), row, reason }
    }
}

/// Parses a single CSV row, handling double-quoted fields.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                // Escaped quote inside quoted field.
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TRIALS: &str = "subs,sex,begin,end\n\
                          CC1,0,0,400\n\
                          CC2,1,0,400\n\
                          CC1,0,400,800\n";

    #[test]
    fn groups_trials_by_subject_in_first_seen_order() {
        let subjects = parse_trials(TRIALS, Path::new("trials.csv")).unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].id, "CC1");
        assert_eq!(
            subjects[0].trials,
            vec![Trial { begin: 0, end: 400 }, Trial { begin: 400, end: 800 }]
        );
        assert_eq!(subjects[1].label, 1);
    }

    #[test]
    fn extra_index_column_and_float_offsets_are_accepted() {
        let text = ",subs,sex,begin,end\n0,CC1,1,0.0,200.0\n";
        let subjects = parse_trials(text, Path::new("t.csv")).unwrap();
        assert_eq!(subjects[0].trials[0], Trial { begin: 0, end: 200 });
    }

    #[test]
    fn conflicting_labels_are_rejected() {
        let text = "subs,sex,begin,end\nCC1,0,0,10\nCC1,1,10,20\n";
        let err = parse_trials(text, Path::new("t.csv")).unwrap_err();
        assert!(matches!(err, DataError::Table { row: 3, .. }));
    }

    #[test]
    fn missing_ages_become_none() {
        let text = "subs,age,hand\nCC1,34,R\nCC2,,L\n\"CC3\",NaN,R\n";
        let ages = parse_participants(text, Path::new("p.csv")).unwrap();
        assert_eq!(ages["CC1"], Some(34.0));
        assert_eq!(ages["CC2"], None);
        assert_eq!(ages["CC3"], None);
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        assert_eq!(parse_csv_row(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
        assert_eq!(parse_csv_row(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }
}
