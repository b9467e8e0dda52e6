//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::plan::{GenerateArgs, PlanArgs};
use crate::commands::record::RecordArgs;

/// Study planner.
///
/// Spreads daily study hours across subjects with deadlines, and learns how
/// long each unit of work takes from the sessions it records.
#[derive(Debug, Parser)]
#[command(name = "sp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a study plan.
    Generate(GenerateArgs),

    /// Generate a fresh plan with a new random variant.
    Reschedule(PlanArgs),

    /// Record an actual study session for training.
    RecordSession(RecordArgs),

    /// Retrain the effort model from recorded sessions.
    Train,

    /// Manage saved plans.
    #[command(subcommand)]
    Plans(PlansAction),
}

/// Saved plan operations.
#[derive(Debug, Subcommand)]
pub enum PlansAction {
    /// List saved plans, newest first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a saved plan.
    Show {
        /// Plan ID.
        id: i64,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a saved plan.
    Delete {
        /// Plan ID.
        id: i64,
    },
}
