//! CLI subcommand implementations.

pub mod plan;
pub mod plans;
pub mod record;
pub mod train;
