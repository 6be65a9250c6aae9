//! Command-line interface for parity-fixtures
//!
//! # Usage Examples
//!
//! ```bash
//! # Populate the built-in parity tables, skipping unchanged ones
//! parity-fixtures populate \
//!   --postgresql-connection-string "host=localhost user=postgres password=postgres dbname=parity"
//!
//! # Populate two tables from a definitions file into a dedicated schema
//! parity-fixtures populate \
//!   --definitions fixtures.yaml \
//!   --tables hundred_rows,fails_pii \
//!   --pg-schema qa \
//!   --batch-size 5000
//!
//! # Exercise generation and batching without a database
//! parity-fixtures populate --dry-run --tables realish_id
//!
//! # Show the signature each table would be recorded with
//! parity-fixtures signatures --definitions fixtures.yaml
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) for progress output.

mod populate;

use clap::{Parser, Subcommand};
use fixture_populate::{DefinitionArgs, PopulateArgs};

#[derive(Parser)]
#[command(name = "parity-fixtures")]
#[command(about = "Populate reproducible fixture tables for data parity tests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and fill every table whose signature changed
    Populate {
        #[command(flatten)]
        args: PopulateArgs,
    },

    /// Print each table's name, registry position and signature
    Signatures {
        #[command(flatten)]
        args: DefinitionArgs,
    },

    /// List tables with their row counts and mutated columns
    List {
        #[command(flatten)]
        args: DefinitionArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Populate { args } => populate::run_populate(args).await?,
        Commands::Signatures { args } => populate::print_signatures(&args)?,
        Commands::List { args } => populate::print_tables(&args)?,
    }

    Ok(())
}
