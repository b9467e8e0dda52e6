//! Subject input records and their normalization into scheduling units.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::dates::parse_date;

/// Default difficulty and importance when a subject leaves them unset.
pub const DEFAULT_RATING: i64 = 3;

/// Task type label used when a subject has none.
pub const DEFAULT_TASK_TYPE: &str = "Other";

/// A subject as submitted by the user.
///
/// Every field is optional and loosely typed: numbers may arrive as JSON
/// numbers or numeric strings, and values that fail to parse are treated as
/// absent rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectInput {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,

    /// ISO date or `YYYY-MM-DD` string.
    #[serde(default, deserialize_with = "loose_string")]
    pub deadline: Option<String>,

    /// Amount of material, in units of work.
    #[serde(default, deserialize_with = "loose_number")]
    pub syllabus_size: Option<f64>,

    #[serde(default, deserialize_with = "loose_number")]
    pub difficulty: Option<f64>,

    #[serde(default, deserialize_with = "loose_number")]
    pub importance: Option<f64>,

    #[serde(default, deserialize_with = "loose_string")]
    pub task_type: Option<String>,
}

impl SubjectInput {
    /// A subject with only a name; every other field takes its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Trimmed name, or `None` when missing or blank.
    pub fn trimmed_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Difficulty with zero or missing values replaced by the default.
    pub fn difficulty_or_default(&self) -> i64 {
        rating_or_default(self.difficulty)
    }

    /// Importance with zero or missing values replaced by the default.
    pub fn importance_or_default(&self) -> i64 {
        rating_or_default(self.importance)
    }

    /// Syllabus size with zero or missing values replaced by 1.
    pub fn syllabus_size_or_default(&self) -> f64 {
        self.syllabus_size.filter(|size| *size != 0.0).unwrap_or(1.0)
    }

    /// Task type label, defaulting to [`DEFAULT_TASK_TYPE`].
    pub fn task_type_or_default(&self) -> &str {
        self.task_type
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(DEFAULT_TASK_TYPE)
    }

    /// Parsed deadline, `None` when absent or unparseable.
    pub fn parsed_deadline(&self) -> Option<NaiveDate> {
        self.deadline.as_deref().and_then(parse_date)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn rating_or_default(value: Option<f64>) -> i64 {
    match value.map(f64::trunc) {
        Some(v) if v != 0.0 => v as i64,
        _ => DEFAULT_RATING,
    }
}

/// A subject's mutable scheduling state for a single allocation run.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyUnit {
    pub name: String,
    pub deadline: Option<NaiveDate>,

    /// Whole units of work, fixed at normalization time (at least 1).
    pub units_total: u32,

    /// Work still to schedule. Starts at `units_total`, never below 0.
    pub units_left: f64,

    pub difficulty: i64,
    pub importance: i64,
    pub task_type: String,

    /// Static priority base: `units_total * max(1, importance)`.
    pub weight: f64,
}

impl StudyUnit {
    /// Days from `day` until this unit's deadline, if it has one. May be negative.
    pub fn days_until_deadline(&self, day: NaiveDate) -> Option<i64> {
        self.deadline.map(|deadline| (deadline - day).num_days())
    }

    /// Consume `amount` units of work, flooring at zero.
    pub fn consume(&mut self, amount: f64) {
        self.units_left = (self.units_left - amount).max(0.0);
    }
}

/// Convert raw subjects into scheduling units.
///
/// Subjects with a blank name are skipped silently. Order is preserved.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn normalize_subjects(subjects: &[SubjectInput]) -> Vec<StudyUnit> {
    let units: Vec<StudyUnit> = subjects
        .iter()
        .filter_map(|subject| {
            let name = subject.trimmed_name()?;
            let units_total = subject
                .syllabus_size_or_default()
                .round_ties_even()
                .max(1.0) as u32;
            let importance = subject.importance_or_default();

            Some(StudyUnit {
                name: name.to_string(),
                deadline: subject.parsed_deadline(),
                units_total,
                units_left: f64::from(units_total),
                difficulty: subject.difficulty_or_default(),
                importance,
                task_type: subject.task_type_or_default().to_string(),
                weight: f64::from(units_total) * (importance.max(1) as f64),
            })
        })
        .collect();

    let skipped = subjects.len() - units.len();
    if skipped > 0 {
        tracing::debug!(skipped, "dropped subjects without a name");
    }

    units
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}
