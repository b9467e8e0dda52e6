//! `sp record-session`: log an actual study session for training.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Args;
use sp_core::SessionObservation;
use sp_db::Database;

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Subject studied.
    #[arg(long)]
    pub subject: String,

    /// Hours actually spent.
    #[arg(long)]
    pub hours: f64,

    #[arg(long, default_value_t = 3)]
    pub difficulty: i64,

    #[arg(long, default_value_t = 3)]
    pub importance: i64,

    /// Units of material covered by the subject.
    #[arg(long, default_value_t = 1.0)]
    pub syllabus_size: f64,

    /// Days left before the deadline at the time of the session.
    #[arg(long)]
    pub days_to_deadline: Option<i64>,

    #[arg(long, default_value = "Other")]
    pub task_type: String,
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, args: &RecordArgs) -> Result<()> {
    let subject = args.subject.trim();
    if subject.is_empty() || !args.hours.is_finite() || args.hours <= 0.0 {
        bail!("subject and positive hours required");
    }

    let session = SessionObservation {
        subject: subject.to_string(),
        actual_hours: args.hours,
        difficulty: args.difficulty,
        importance: args.importance,
        syllabus_size: args.syllabus_size,
        days_to_deadline: args.days_to_deadline,
        task_type: args.task_type.clone(),
    };
    db.insert_sessions(&[session])?;
    writeln!(writer, "Recorded {:.2}h of {subject}", args.hours)?;
    Ok(())
}
