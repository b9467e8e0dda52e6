//! Conversion of generated timetables into study-session observations.
//!
//! Observations feed the effort model's training set. Conversion is
//! best-effort: malformed dates become missing fields instead of errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::allocation::Timetable;
use crate::dates::parse_date;
use crate::subject::SubjectInput;

/// One observed (or planned) study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionObservation {
    pub subject: String,
    pub actual_hours: f64,
    pub difficulty: i64,
    pub importance: i64,
    pub syllabus_size: f64,
    /// Days from the session to the subject's deadline, floored at 0.
    /// `None` when either date is missing or unparseable.
    pub days_to_deadline: Option<i64>,
    pub task_type: String,
}

/// Turn every non-empty assignment in `timetable` into an observation.
///
/// Subject metadata is looked up by trimmed name; assignments for unknown
/// subjects still produce a row with default metadata.
pub fn observations_from_timetable(
    timetable: &Timetable,
    subjects: &[SubjectInput],
) -> Vec<SessionObservation> {
    let meta_by_name: HashMap<&str, &SubjectInput> = subjects
        .iter()
        .filter_map(|subject| Some((subject.trimmed_name()?, subject)))
        .collect();
    let fallback = SubjectInput::default();

    let mut observations = Vec::new();
    for (date, slots) in timetable {
        let day = parse_date(date);

        for slot in slots {
            if slot.hours <= 0.0 || !slot.hours.is_finite() {
                continue;
            }
            let meta = meta_by_name
                .get(slot.subject.as_str())
                .copied()
                .unwrap_or(&fallback);
            let days_to_deadline = day
                .zip(meta.parsed_deadline())
                .map(|(day, deadline)| (deadline - day).num_days().max(0));

            observations.push(SessionObservation {
                subject: slot.subject.clone(),
                actual_hours: slot.hours,
                difficulty: meta.difficulty_or_default(),
                importance: meta.importance_or_default(),
                syllabus_size: meta.syllabus_size_or_default(),
                days_to_deadline,
                task_type: meta.task_type_or_default().to_string(),
            });
        }
    }

    tracing::debug!(rows = observations.len(), "converted timetable to observations");
    observations
}
