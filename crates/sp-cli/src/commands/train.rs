//! `sp train`: refit the effort model from all recorded sessions.

use std::io::Write;

use anyhow::{Context, Result};
use sp_db::Database;

use crate::Config;
use crate::commands::plan::retrain;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let sessions = retrain(db, &config.model_path).context("training failed")?;
    writeln!(
        writer,
        "Trained effort model on {sessions} sessions: {}",
        config.model_path.display()
    )?;
    Ok(())
}
