//! Plan generation: `sp generate` and `sp reschedule`.
//!
//! Runs the allocation engine on a JSON file of subjects, then feeds the
//! result back into session history and retrains the effort model. The
//! feedback steps are best-effort: a failure there is logged and the plan is
//! still printed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Args;
use serde::Serialize;
use sp_core::{
    HoursPredictor, LinearModel, PlanConfig, PlanOutcome, ScheduleMode, SubjectInput, Timetable,
    create_timetable, load_predictor, observations_from_timetable,
};
use sp_db::Database;

use crate::Config;

/// Options shared by `generate` and `reschedule`.
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// JSON file with an array of subjects.
    #[arg(long, value_name = "FILE")]
    pub subjects: PathBuf,

    /// Study hours per day (defaults to the configured value).
    #[arg(long)]
    pub daily_hours: Option<f64>,

    /// How each day's hours are distributed.
    #[arg(long, default_value = "daily")]
    pub mode: ScheduleMode,

    /// A day off (YYYY-MM-DD). Repeat for several days.
    #[arg(long, value_name = "DATE")]
    pub unavailable: Vec<String>,

    /// Keep Saturdays and Sundays free.
    #[arg(long)]
    pub limit_weekends: bool,

    /// First day of the plan (defaults to today).
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Save the plan under this title.
    #[arg(long, value_name = "TITLE")]
    pub save: Option<String>,

    /// Don't record the plan as session history or retrain the model.
    #[arg(long)]
    pub no_record: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `sp generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Random variant to reproduce a previous plan.
    #[arg(long)]
    pub variant: Option<i64>,
}

/// JSON output for a generated plan.
#[derive(Debug, Serialize)]
struct PlanJson<'a> {
    timetable: &'a Timetable,
    variant: i64,
    model_trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_id: Option<i64>,
}

/// Read the subjects file.
pub fn read_subjects(path: &Path) -> Result<Vec<SubjectInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read subjects from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid subjects file {}", path.display()))
}

/// Every subject submitted for planning must carry a deadline.
///
/// The engine itself tolerates open-ended subjects; this is a request-level rule.
pub fn validate_deadlines(subjects: &[SubjectInput]) -> Result<()> {
    let missing = subjects.iter().any(|subject| {
        subject
            .deadline
            .as_deref()
            .map(str::trim)
            .is_none_or(str::is_empty)
    });
    if missing {
        bail!("deadline missing for one or more subjects");
    }
    Ok(())
}

fn resolve_daily_hours(args: &PlanArgs, config: &Config) -> Result<f64> {
    let hours = args.daily_hours.unwrap_or(config.daily_hours);
    if !hours.is_finite() || hours <= 0.0 {
        bail!("daily hours must be a positive number, got {hours}");
    }
    Ok(hours)
}

/// Record the plan as history and retrain. Returns whether a model was saved.
fn learn_from_plan(
    db: &mut Database,
    config: &Config,
    timetable: &Timetable,
    subjects: &[SubjectInput],
) -> bool {
    let observations = observations_from_timetable(timetable, subjects);
    match db.insert_sessions(&observations) {
        Ok(rows) => tracing::info!(rows, "recorded generated sessions"),
        Err(err) => tracing::warn!(error = %err, "failed to record generated sessions"),
    }

    match retrain(db, &config.model_path) {
        Ok(sessions) => {
            tracing::info!(sessions, path = %config.model_path.display(), "trained effort model");
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "training failed");
            false
        }
    }
}

/// Fit a model on all recorded sessions and save it. Returns the session count.
pub fn retrain(db: &Database, model_path: &Path) -> Result<usize> {
    let sessions = db.list_sessions().context("failed to load session history")?;
    let model = LinearModel::fit(&sessions)?;
    model
        .save(model_path)
        .context("failed to save effort model")?;
    Ok(sessions.len())
}

/// Runs plan generation. `variant` of `None` draws a fresh one.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    args: &PlanArgs,
    variant: Option<i64>,
) -> Result<()> {
    let subjects = read_subjects(&args.subjects)?;
    validate_deadlines(&subjects)?;

    let plan_config = PlanConfig {
        daily_hours: resolve_daily_hours(args, config)?,
        mode: args.mode,
        unavailable_dates: args.unavailable.clone(),
        variant,
        limit_weekends: args.limit_weekends,
    };
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let model = load_predictor(&config.model_path);
    let predictor = model.as_ref().map(|m| m as &dyn HoursPredictor);

    let outcome = create_timetable(&subjects, &plan_config, predictor, today);
    tracing::debug!(
        variant = outcome.variant,
        days = outcome.timetable.len(),
        learned = model.is_some(),
        "generated plan"
    );

    let model_trained = if args.no_record {
        false
    } else {
        learn_from_plan(db, config, &outcome.timetable, &subjects)
    };

    let saved_id = match &args.save {
        Some(title) => Some(
            db.save_timetable(Some(title), Some(outcome.variant), &outcome.timetable)
                .context("failed to save plan")?,
        ),
        None => None,
    };

    if args.json {
        let json = PlanJson {
            timetable: &outcome.timetable,
            variant: outcome.variant,
            model_trained,
            saved_id,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&json)?)?;
    } else {
        write!(writer, "{}", format_plan(&outcome, args.mode))?;
        if model_trained {
            writeln!(writer, "Effort model retrained.")?;
        }
        if let Some(id) = saved_id {
            writeln!(writer, "Saved as plan {id}.")?;
        }
    }

    Ok(())
}

// ========== Formatting ==========

/// Formats one day's assignments, e.g. `Math 2.50h, Physics 1.25h`.
fn format_slots(slots: &[sp_core::DailyAssignment]) -> String {
    if slots.is_empty() {
        return "-".to_string();
    }
    slots
        .iter()
        .map(|slot| format!("{} {:.2}h", slot.subject, slot.hours))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats a timetable as one line per day followed by per-subject totals.
pub fn format_days(timetable: &Timetable) -> String {
    let mut output = String::new();
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();

    for (date, slots) in timetable {
        let weekday = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.format("%a").to_string())
            .unwrap_or_default();
        let _ = writeln!(output, "{date} {weekday:<3}  {}", format_slots(slots));
        for slot in slots {
            *totals.entry(&slot.subject).or_insert(0.0) += slot.hours;
        }
    }

    if !totals.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Totals:");
        let width = totals.keys().map(|name| name.len()).max().unwrap_or(0);
        for (name, hours) in &totals {
            let _ = writeln!(output, "  {name:<width$}  {hours:>6.2}h");
        }
    }

    output
}

/// Formats a generated plan with a header line.
pub fn format_plan(outcome: &PlanOutcome, mode: ScheduleMode) -> String {
    let (Some(first), Some(last)) = (
        outcome.timetable.keys().next(),
        outcome.timetable.keys().next_back(),
    ) else {
        return "No subjects to plan.\n".to_string();
    };

    let mut output = String::new();
    let _ = writeln!(
        output,
        "Study plan {first} to {last} ({mode}, variant {})",
        outcome.variant
    );
    let _ = writeln!(output);
    output.push_str(&format_days(&outcome.timetable));
    output
}
