use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "api-model")]
#[command(about = "Inspect the API structure of compiled Java components")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session config (JSON). Defaults to $API_MODEL_CONFIG.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Adds a classpath root to a component; repeatable.
    #[arg(long = "component", value_name = "ID=PATH")]
    pub components: Vec<String>,

    /// Record Record/Module sections instead of failing the unit.
    #[arg(long)]
    pub tolerate_unsupported: bool,

    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List qualified type names without decoding anything.
    List { component: String },
    /// Decode one type and print its structure.
    Show {
        component: String,
        type_name: String,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Decode every unit and report faults.
    Scan {
        component: String,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Exit non-zero when any unit fails.
        #[arg(long)]
        strict: bool,
    },
    /// SHA-256 of one unit's bytes.
    Digest { component: String, type_name: String },
    /// Superclass names of a type, nearest first.
    Hierarchy { component: String, type_name: String },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
