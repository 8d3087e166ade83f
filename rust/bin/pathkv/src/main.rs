//! `pathkv`: command-line client for hierarchical key-value stores.
//!
//! Keys are separator-joined paths (`users/1`); a trailing `*` turns a path
//! into a prefix query (`users/*`).

mod commands;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pathkv_kv::Context;

use commands::kv::Output;
use config::{Backend, CliConfig};

/// pathkv CLI tool.
#[derive(Parser, Debug)]
#[command(name = "pathkv", about = "Hierarchical path key-value store client")]
struct Cli {
    /// Path to config file (default: ~/.pathkv/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Storage backend (overrides the config file).
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Database file (overrides the config file).
    #[arg(long = "db", global = true)]
    db_path: Option<PathBuf>,

    /// Path segment separator (overrides the config file).
    #[arg(long, global = true)]
    separator: Option<String>,

    /// Abort the operation after this many milliseconds.
    #[arg(long = "timeout-ms", global = true)]
    timeout_ms: Option<u64>,

    /// Output format for fetched records.
    #[arg(long = "output", short = 'o', global = true, value_enum, default_value = "table")]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a key, or every key under a prefix (`users/*`).
    Get { path: String },

    /// Append key/value pairs; existing records for a key are kept.
    Put {
        /// Alternating keys and values.
        #[arg(required = true, num_args = 1..)]
        pairs: Vec<String>,
    },

    /// Replace the value stored under each key.
    Upsert {
        /// Alternating keys and values.
        #[arg(required = true, num_args = 1..)]
        pairs: Vec<String>,
    },

    /// Delete a key, or every key under a prefix.
    Delete { path: String },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with record output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(CliConfig::default_path);
    let mut config = CliConfig::load(&config_path)?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(db_path) = cli.db_path {
        config.db_path = Some(db_path);
    }
    if let Some(separator) = cli.separator {
        config.paths.separator = separator;
    }

    let client = commands::open::client(&config)?;
    let ctx = match cli.timeout_ms {
        Some(ms) => Context::background().with_timeout(Duration::from_millis(ms)),
        None => Context::background(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Get { path } => commands::kv::get(&client, &ctx, &path, cli.output, &mut out)?,
        Commands::Put { pairs } => commands::kv::put(&client, &ctx, &pairs, &mut out)?,
        Commands::Upsert { pairs } => commands::kv::upsert(&client, &ctx, &pairs, &mut out)?,
        Commands::Delete { path } => commands::kv::delete(&client, &ctx, &path, &mut out)?,
    }

    Ok(())
}
