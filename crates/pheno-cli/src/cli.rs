//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use pheno_model::{FieldId, FieldKey};

#[derive(Parser)]
#[command(
    name = "pheno",
    version,
    about = "Extract phenotype events from UK Biobank source tables",
    long_about = "Extract phenotype events from UK Biobank source tables.\n\n\
                  Phenotypes are read from YAML definition documents; events are\n\
                  written to a SQLite event table, one extraction per phenotype and field."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory of phenotype definition documents
    /// (default: $PHENO_DEFINITIONS_DIR, then phenotypes/ukbiobank).
    #[arg(long = "definitions", value_name = "DIR", global = true)]
    pub definitions: Option<PathBuf>,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow subject identifiers in trace-level logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract phenotypes into the event table.
    Extract(ExtractArgs),

    /// List phenotypes in the catalogue.
    List(ListArgs),

    /// List phenotype categories.
    Categories,

    /// Show one phenotype definition.
    Show {
        #[arg(value_name = "PHENOTYPE")]
        name: String,
    },

    /// Create the event table in a SQLite database.
    InitDb {
        #[arg(long = "db", value_name = "PATH")]
        db: PathBuf,
    },

    /// Earliest event per subject, phenotype and field.
    FirstEvents(FirstEventsArgs),
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Phenotype names to extract (default: every phenotype in the catalogue).
    #[arg(value_name = "PHENOTYPE")]
    pub phenotypes: Vec<String>,

    /// Directory holding one CSV per source table.
    #[arg(long = "sources", value_name = "DIR")]
    pub sources: PathBuf,

    /// SQLite event database; required unless `--testing` is set.
    #[arg(long = "db", value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Only extract these fields (comma separated).
    #[arg(long = "fields", value_name = "FIELD", value_delimiter = ',')]
    pub fields: Vec<FieldKey>,

    /// Delete and re-extract fields that already have rows.
    #[arg(long = "refresh", conflicts_with = "testing")]
    pub refresh: bool,

    /// Collect rows without touching the database.
    #[arg(long = "testing")]
    pub testing: bool,

    /// Field holding age at event, overriding the definition.
    #[arg(long = "age-field", value_name = "FIELD")]
    pub age_field: Option<FieldId>,

    /// Field holding the event year, overriding the definition.
    #[arg(long = "year-field", value_name = "FIELD")]
    pub year_field: Option<FieldId>,

    /// Write rows collected in testing mode to this CSV (default: stdout).
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long = "exclude-cancer")]
    pub exclude_cancer: bool,

    /// Leave out phenotypes not defined for adults.
    #[arg(long = "exclude-neonatal")]
    pub exclude_neonatal: bool,

    #[arg(long = "include-elixhauser")]
    pub include_elixhauser: bool,

    #[arg(long = "include-complex")]
    pub include_complex: bool,

    /// Only phenotypes in this category.
    #[arg(long = "category", value_name = "NAME")]
    pub category: Option<String>,
}

#[derive(Args)]
pub struct FirstEventsArgs {
    /// Restrict to these phenotypes (default: all in the event table).
    #[arg(value_name = "PHENOTYPE")]
    pub phenotypes: Vec<String>,

    #[arg(long = "db", value_name = "PATH")]
    pub db: PathBuf,

    /// Source directory used to clamp events to birth dates.
    #[arg(long = "sources", value_name = "DIR")]
    pub sources: Option<PathBuf>,

    /// Keep only the earliest dated row per subject and phenotype.
    #[arg(long = "per-phenotype")]
    pub per_phenotype: bool,

    /// Write the CSV here instead of stdout.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn refresh_and_testing_are_rejected_while_parsing() {
        let err = Cli::try_parse_from([
            "pheno", "extract", "asthma", "--sources", "src", "--refresh", "--testing",
        ])
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn extract_accepts_no_phenotype_names() {
        let cli = Cli::try_parse_from(["pheno", "extract", "--sources", "src", "--testing"])
            .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert!(args.phenotypes.is_empty());
        assert!(args.testing);
    }

    #[test]
    fn list_includes_everything_unless_excluded() {
        let cli = Cli::try_parse_from(["pheno", "list", "--exclude-cancer"]).unwrap();
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert!(args.exclude_cancer);
        assert!(!args.exclude_neonatal);
    }
}
