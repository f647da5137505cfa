//! Delicious CLI - database migrations and sample data.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! delicious-cli migrate
//!
//! # Load the bundled sample data, replacing whatever is there
//! delicious-cli seed crates/cli/data/sample.yaml --wipe
//! ```
//!
//! Both commands read `DELICIOUS_DATABASE_URL` (or `DATABASE_URL`),
//! loading `.env` first when present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "delicious-cli")]
#[command(author, version, about = "Delicious CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load users, stores, reviews and hearts from a YAML file
    Seed {
        /// Path to the seed file
        file: String,

        /// Delete all existing users, stores, reviews and hearts first
        #[arg(long)]
        wipe: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, wipe } => commands::seed::run(&file, wipe).await?,
    }
    Ok(())
}
