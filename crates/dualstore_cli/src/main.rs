//! dualstore CLI
//!
//! Command-line tools for checking entity mappings and the queries compiled
//! from them.
//!
//! # Commands
//!
//! - `explain` - Show the SQL statement and index request compiled from a query
//! - `check-fields` - Validate a field table and list the index schema it implies

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};
use commands::explain::{ExplainOptions, StoreKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dualstore command-line mapping tools.
#[derive(Parser)]
#[command(name = "dualstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter, e.g. `warn` or `dualstore_core=debug`
    #[arg(global = true, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the SQL statement and index request compiled from a query
    Explain {
        /// Field table JSON file
        #[arg(long)]
        fields: PathBuf,

        /// Query parameters JSON file
        #[arg(long)]
        params: PathBuf,

        /// Store configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Relational table name
        #[arg(short, long, default_value = "entity")]
        table: String,

        /// Index document type (defaults to the table name)
        #[arg(short, long)]
        index_type: Option<String>,

        /// Apply the soft-delete filter of dated stores
        #[arg(long)]
        dated: bool,

        /// Apply the soft-delete and active filters of dictionary stores
        #[arg(long, conflicts_with = "dated")]
        dictionary: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a field table and list the index schema it implies
    CheckFields {
        /// Field table JSON file
        #[arg(long)]
        fields: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Explain {
            fields,
            params,
            config,
            table,
            index_type,
            dated,
            dictionary,
            format,
        } => {
            let store = if dictionary {
                StoreKind::Dictionary
            } else if dated {
                StoreKind::Dated
            } else {
                StoreKind::Basic
            };
            let options = ExplainOptions {
                index_type: index_type.unwrap_or_else(|| table.clone()),
                table,
                fields,
                params,
                config,
                store,
            };
            print!("{}", commands::explain::run(&options, format)?);
        }
        Commands::CheckFields { fields, format } => {
            print!("{}", commands::check_fields::run(&fields, format)?);
        }
    }

    Ok(())
}
