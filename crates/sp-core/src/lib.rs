//! Core domain logic for the study planner.
//!
//! This crate contains the fundamental types and logic for:
//! - Normalization: turning loosely-typed subjects into scheduling units
//! - Estimation: predicting hours per unit of work, learned or heuristic
//! - Allocation: distributing daily study hours across subjects
//! - History: converting plans into observations for retraining

pub mod allocation;
pub mod dates;
pub mod estimate;
pub mod history;
pub mod model;
pub mod subject;

pub use allocation::{
    DailyAssignment, PlanConfig, PlanOutcome, ScheduleMode, Timetable, UnknownScheduleMode,
    create_timetable, horizon_end,
};
pub use estimate::{HoursPredictor, PredictionError};
pub use history::{SessionObservation, observations_from_timetable};
pub use model::{LinearModel, ModelError, load_predictor};
pub use subject::{StudyUnit, SubjectInput, normalize_subjects};
