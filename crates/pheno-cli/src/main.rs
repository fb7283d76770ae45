//! Phenotype extraction CLI.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use pheno_cli::logging::{LogConfig, LogFormat, init_logging};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{
    load_catalogue, run_categories, run_extract, run_first_events, run_init_db, run_list,
    run_show,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let definitions = cli.definitions.as_deref();
    let result = match &cli.command {
        Command::Extract(args) => {
            load_catalogue(definitions).and_then(|catalogue| run_extract(&catalogue, args))
        }
        Command::List(args) => {
            load_catalogue(definitions).and_then(|catalogue| run_list(&catalogue, args))
        }
        Command::Categories => {
            load_catalogue(definitions).and_then(|catalogue| run_categories(&catalogue))
        }
        Command::Show { name } => {
            load_catalogue(definitions).and_then(|catalogue| run_show(&catalogue, name))
        }
        Command::InitDb { db } => run_init_db(db),
        Command::FirstEvents(args) => run_first_events(args),
    };
    let exit_code = match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
