//! Learned effort model.
//!
//! A ridge-regularized linear regression over the subject features used by
//! the estimator, trained from recorded study sessions and stored as a small
//! JSON artifact next to the database.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimate::{
    BASE_COLUMNS, EffortFeatures, HoursPredictor, NO_DEADLINE_DAYS, PredictionError,
    TASK_COLUMN_PREFIX,
};
use crate::history::SessionObservation;

/// L2 penalty on non-intercept coefficients. Keeps collinear one-hot
/// columns solvable.
const RIDGE_LAMBDA: f64 = 1e-3;

/// Pivots smaller than this mean the normal equations are singular.
const PIVOT_EPS: f64 = 1e-12;

/// Effort model errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// There is nothing to train on.
    #[error("no session history available for training")]
    NoHistory,

    /// The training data does not determine a unique solution.
    #[error("training data is degenerate, could not solve for coefficients")]
    Singular,

    /// The artifact's columns and coefficients disagree.
    #[error("model has {columns} columns but {coefficients} coefficients")]
    Shape { columns: usize, coefficients: usize },

    /// Reading or writing the artifact failed.
    #[error("model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The artifact is not valid JSON for a model.
    #[error("invalid model artifact: {0}")]
    Json(#[from] serde_json::Error),
}

/// Linear hours-per-unit model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    columns: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// Build a model from explicit parameters.
    pub fn new(
        columns: Vec<String>,
        intercept: f64,
        coefficients: Vec<f64>,
    ) -> Result<Self, ModelError> {
        if columns.len() != coefficients.len() {
            return Err(ModelError::Shape {
                columns: columns.len(),
                coefficients: coefficients.len(),
            });
        }
        Ok(Self {
            columns,
            intercept,
            coefficients,
        })
    }

    /// Train on recorded sessions. The target is the session's hours.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(observations: &[SessionObservation]) -> Result<Self, ModelError> {
        if observations.is_empty() {
            return Err(ModelError::NoHistory);
        }

        let task_types: BTreeSet<&str> = observations
            .iter()
            .map(|obs| obs.task_type.as_str())
            .collect();
        let columns: Vec<String> = BASE_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(
                task_types
                    .iter()
                    .map(|t| format!("{TASK_COLUMN_PREFIX}{t}")),
            )
            .collect();

        // Normal equations over [1, x...]; index 0 is the intercept.
        let width = columns.len() + 1;
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for obs in observations {
            let mut row = Vec::with_capacity(width);
            row.push(1.0);
            row.extend(observation_features(obs).to_vector(&columns));
            for i in 0..width {
                moment[i] += row[i] * obs.actual_hours;
                for j in 0..width {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for (i, gram_row) in gram.iter_mut().enumerate().skip(1) {
            gram_row[i] += RIDGE_LAMBDA * observations.len() as f64;
        }

        let solution = solve(gram, moment).ok_or(ModelError::Singular)?;
        tracing::debug!(
            rows = observations.len(),
            columns = columns.len(),
            "fitted effort model"
        );
        Self::new(columns, solution[0], solution[1..].to_vec())
    }

    /// Column names in feature-vector order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Load a model artifact.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_str(&raw)?;
        Self::new(model.columns, model.intercept, model.coefficients)
    }

    /// Write the model artifact, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }
}

impl HoursPredictor for LinearModel {
    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict(&self, features: &[f64]) -> Result<f64, PredictionError> {
        if features.len() != self.coefficients.len() {
            return Err(PredictionError::FeatureCount {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = features
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum();
        Ok(self.intercept + dot)
    }
}

/// Load the model at `path` if there is a usable one.
///
/// A missing file is normal before the first training run. Unreadable or
/// corrupt artifacts are logged and ignored so planning falls back to the
/// heuristic estimate.
pub fn load_predictor(path: &Path) -> Option<LinearModel> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no effort model yet");
        return None;
    }
    match LinearModel::load(path) {
        Ok(model) => Some(model),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unusable effort model");
            None
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn observation_features(obs: &SessionObservation) -> EffortFeatures<'_> {
    EffortFeatures {
        difficulty: obs.difficulty as f64,
        importance: obs.importance as f64,
        syllabus_size: obs.syllabus_size,
        days_to_deadline: obs.days_to_deadline.unwrap_or(NO_DEADLINE_DAYS) as f64,
        task_type: &obs.task_type,
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPS {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (k, value) in a[row].iter_mut().enumerate().skip(col) {
                *value -= factor * pivot_row[k];
            }
            b[row] -= factor * pivot_b;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
