use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sp_cli::commands::{plan, plans, record, train};
use sp_cli::{Cli, Commands, Config, PlansAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(sp_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sp_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Generate(args)) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            plan::run(&mut stdout, &mut db, &config, &args.plan, args.variant)?;
        }
        Some(Commands::Reschedule(args)) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            plan::run(&mut stdout, &mut db, &config, args, None)?;
        }
        Some(Commands::RecordSession(args)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            record::run(&mut stdout, &mut db, args)?;
        }
        Some(Commands::Train) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            train::run(&mut stdout, &db, &config)?;
        }
        Some(Commands::Plans(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                PlansAction::List { json } => plans::list(&mut stdout, &db, *json)?,
                PlansAction::Show { id, json } => plans::show(&mut stdout, &db, *id, *json)?,
                PlansAction::Delete { id } => plans::delete(&mut stdout, &mut db, *id)?,
            }
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
