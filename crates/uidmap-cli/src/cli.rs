use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "uidmap",
    about = "Stable integer identifiers for string keys",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Journal file backing the registry (overrides the config file).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Get or allocate ids for keys
    Id(IdArgs),
    /// Resolve ids back to keys
    Lookup(LookupArgs),
    /// List every binding
    List,
    /// Rewrite the journal keeping only live bindings
    Compact,
}

#[derive(Args)]
pub struct IdArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct LookupArgs {
    #[arg(required = true)]
    pub ids: Vec<i64>,
}
