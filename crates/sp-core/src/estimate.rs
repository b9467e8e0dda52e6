//! Per-subject, per-day estimate of study hours needed for one unit of work.
//!
//! A learned predictor is consulted first when one is available. Any failure
//! there (missing model, bad output, prediction error) falls back to a
//! randomized heuristic so the planner never aborts on the estimator.

use chrono::NaiveDate;
use rand::Rng;
use thiserror::Error;

use crate::subject::StudyUnit;

/// Lower bound for any hours-per-unit estimate.
pub const MIN_UNIT_HOURS: f64 = 0.25;

/// Upper bound for any hours-per-unit estimate.
pub const MAX_UNIT_HOURS: f64 = 4.0;

/// Days-to-deadline assumed for subjects without a deadline.
pub const NO_DEADLINE_DAYS: i64 = 30;

/// Prefix of the one-hot task type feature columns.
pub const TASK_COLUMN_PREFIX: &str = "task_";

/// Non-categorical feature columns, in training order.
pub const BASE_COLUMNS: [&str; 4] = [
    "difficulty",
    "importance",
    "syllabus_size",
    "days_to_deadline",
];

/// Failure to produce a prediction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    /// The feature vector does not match the model's columns.
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    /// The model produced NaN or infinity.
    #[error("prediction is not a finite number: {0}")]
    NonFinite(f64),
}

/// A learned model that predicts hours per unit of work.
pub trait HoursPredictor {
    /// Column names the model was trained on, in feature-vector order.
    fn feature_columns(&self) -> &[String];

    /// Predict hours per unit from a feature vector laid out by `feature_columns`.
    fn predict(&self, features: &[f64]) -> Result<f64, PredictionError>;
}

/// Raw feature values for one subject on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct EffortFeatures<'a> {
    pub difficulty: f64,
    pub importance: f64,
    pub syllabus_size: f64,
    pub days_to_deadline: f64,
    pub task_type: &'a str,
}

impl EffortFeatures<'_> {
    /// Lay the features out in the order of `columns`.
    ///
    /// Task columns are one-hot; unknown columns are zero.
    pub fn to_vector(&self, columns: &[String]) -> Vec<f64> {
        columns
            .iter()
            .map(|column| match column.as_str() {
                "difficulty" => self.difficulty,
                "importance" => self.importance,
                "syllabus_size" => self.syllabus_size,
                "days_to_deadline" => self.days_to_deadline,
                other => match other.strip_prefix(TASK_COLUMN_PREFIX) {
                    Some(label) if label == self.task_type => 1.0,
                    _ => 0.0,
                },
            })
            .collect()
    }
}

/// Build the feature record for `unit` as seen on `day`.
#[allow(clippy::cast_precision_loss)]
pub fn features_for<'a>(unit: &'a StudyUnit, day: NaiveDate) -> EffortFeatures<'a> {
    let days_to_deadline = unit
        .days_until_deadline(day)
        .unwrap_or(NO_DEADLINE_DAYS)
        .max(0);

    EffortFeatures {
        difficulty: unit.difficulty as f64,
        importance: unit.importance as f64,
        syllabus_size: f64::from(unit.units_total),
        days_to_deadline: days_to_deadline as f64,
        task_type: &unit.task_type,
    }
}

fn clamp_unit_hours(hours: f64) -> f64 {
    hours.clamp(MIN_UNIT_HOURS, MAX_UNIT_HOURS)
}

fn predicted_unit_hours(
    predictor: &dyn HoursPredictor,
    unit: &StudyUnit,
    day: NaiveDate,
) -> Result<f64, PredictionError> {
    let features = features_for(unit, day).to_vector(predictor.feature_columns());
    let hours = predictor.predict(&features)?;
    if !hours.is_finite() {
        return Err(PredictionError::NonFinite(hours));
    }
    Ok(clamp_unit_hours(hours))
}

/// Deadline urgency multiplier for the heuristic estimate.
#[allow(clippy::cast_precision_loss)]
fn heuristic_urgency(days_left: Option<i64>) -> f64 {
    match days_left {
        Some(days) if days <= 0 => 1.5,
        Some(days) => 1.0 + (30 - days.min(30)).max(0) as f64 / 40.0,
        None => 1.0,
    }
}

/// Heuristic hours-per-unit estimate. Draws one value from `rng`.
#[allow(clippy::cast_precision_loss)]
pub fn heuristic_unit_hours<R: Rng>(unit: &StudyUnit, day: NaiveDate, rng: &mut R) -> f64 {
    let base = 0.9 + unit.difficulty as f64 * 0.2 + unit.importance as f64 * 0.15;
    let urgency = heuristic_urgency(unit.days_until_deadline(day));
    let jitter = rng.random_range(0.9..1.15);
    clamp_unit_hours(base * urgency * jitter)
}

/// Estimate hours per unit for `unit` on `day`.
///
/// Uses `predictor` when present; on any prediction failure, and when absent,
/// falls back to [`heuristic_unit_hours`].
pub fn estimate_unit_hours<R: Rng>(
    unit: &StudyUnit,
    day: NaiveDate,
    predictor: Option<&dyn HoursPredictor>,
    rng: &mut R,
) -> f64 {
    if let Some(predictor) = predictor {
        match predicted_unit_hours(predictor, unit, day) {
            Ok(hours) => return hours,
            Err(err) => {
                tracing::debug!(subject = %unit.name, %day, error = %err, "prediction failed, using heuristic");
            }
        }
    }
    heuristic_unit_hours(unit, day, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::{SubjectInput, normalize_subjects};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct FixedPredictor {
        columns: Vec<String>,
        hours: Result<f64, PredictionError>,
    }

    impl HoursPredictor for FixedPredictor {
        fn feature_columns(&self) -> &[String] {
            &self.columns
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, PredictionError> {
            self.hours.clone()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn unit(deadline: Option<&str>, difficulty: f64, importance: f64) -> StudyUnit {
        let subject = SubjectInput {
            name: Some("Math".to_string()),
            deadline: deadline.map(String::from),
            syllabus_size: Some(6.0),
            difficulty: Some(difficulty),
            importance: Some(importance),
            task_type: Some("Exam".to_string()),
        };
        normalize_subjects(&[subject]).remove(0)
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn feature_vector_follows_column_order() {
        let unit = unit(Some("2025-01-11"), 4.0, 2.0);
        let cols = columns(&[
            "task_Reading",
            "days_to_deadline",
            "difficulty",
            "task_Exam",
            "syllabus_size",
            "importance",
            "mystery",
        ]);

        let vector = features_for(&unit, day(1)).to_vector(&cols);

        assert_eq!(vector, vec![0.0, 10.0, 4.0, 1.0, 6.0, 2.0, 0.0]);
    }

    #[test]
    fn days_to_deadline_floors_at_zero_and_defaults_to_thirty() {
        let overdue = unit(Some("2025-01-01"), 3.0, 3.0);
        assert!(features_for(&overdue, day(5)).days_to_deadline.abs() < f64::EPSILON);

        let open_ended = unit(None, 3.0, 3.0);
        assert!((features_for(&open_ended, day(5)).days_to_deadline - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn heuristic_stays_within_jitter_band() {
        let unit = unit(None, 3.0, 3.0);
        let base = 0.9 + 0.6 + 0.45;
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let hours = heuristic_unit_hours(&unit, day(1), &mut rng);
            assert!(hours >= base * 0.9 - 1e-9 && hours <= base * 1.15 + 1e-9);
        }
    }

    #[test]
    fn heuristic_is_clamped() {
        let heavy = unit(Some("2025-01-01"), 20.0, 20.0);
        let light = unit(None, -10.0, -10.0);
        let mut rng = StdRng::seed_from_u64(1);

        assert!((heuristic_unit_hours(&heavy, day(3), &mut rng) - MAX_UNIT_HOURS).abs() < 1e-12);
        assert!((heuristic_unit_hours(&light, day(3), &mut rng) - MIN_UNIT_HOURS).abs() < 1e-12);
    }

    #[test]
    fn urgency_rises_as_deadline_nears() {
        assert!((heuristic_urgency(None) - 1.0).abs() < f64::EPSILON);
        assert!((heuristic_urgency(Some(0)) - 1.5).abs() < f64::EPSILON);
        assert!((heuristic_urgency(Some(-3)) - 1.5).abs() < f64::EPSILON);
        assert!((heuristic_urgency(Some(45)) - 1.0).abs() < f64::EPSILON);
        assert!((heuristic_urgency(Some(10)) - 1.5).abs() < f64::EPSILON);
        assert!((heuristic_urgency(Some(26)) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn predictor_output_is_clamped() {
        let unit = unit(None, 3.0, 3.0);
        let predictor = FixedPredictor {
            columns: columns(&BASE_COLUMNS),
            hours: Ok(9.0),
        };
        let mut rng = StdRng::seed_from_u64(3);

        let hours = estimate_unit_hours(&unit, day(1), Some(&predictor), &mut rng);

        assert!((hours - MAX_UNIT_HOURS).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_prediction_matches_heuristic_draw() {
        let unit = unit(Some("2025-01-20"), 2.0, 4.0);
        let failing = FixedPredictor {
            columns: columns(&BASE_COLUMNS),
            hours: Err(PredictionError::FeatureCount {
                expected: 5,
                actual: 4,
            }),
        };
        let non_finite = FixedPredictor {
            columns: columns(&BASE_COLUMNS),
            hours: Ok(f64::NAN),
        };

        let expected = heuristic_unit_hours(&unit, day(2), &mut StdRng::seed_from_u64(11));
        let from_failing =
            estimate_unit_hours(&unit, day(2), Some(&failing), &mut StdRng::seed_from_u64(11));
        let from_nan =
            estimate_unit_hours(&unit, day(2), Some(&non_finite), &mut StdRng::seed_from_u64(11));
        let from_absent = estimate_unit_hours(&unit, day(2), None, &mut StdRng::seed_from_u64(11));

        assert!((from_failing - expected).abs() < f64::EPSILON);
        assert!((from_nan - expected).abs() < f64::EPSILON);
        assert!((from_absent - expected).abs() < f64::EPSILON);
    }
}
