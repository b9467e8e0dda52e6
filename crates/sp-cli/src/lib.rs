//! Study planner CLI library.
//!
//! This crate provides the CLI interface for the study planner.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, PlansAction};
pub use config::Config;
