//! Bazaar CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! bazaar-cli migrate
//!
//! # Grant or revoke the admin role
//! bazaar-cli admin grant alice
//! bazaar-cli admin revoke alice
//!
//! # Insert catalog products from a YAML file
//! bazaar-cli seed products catalog.yaml
//! ```
//!
//! All commands read `BAZAAR_DATABASE_URL` (or `DATABASE_URL`), optionally
//! from a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the admin role
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give a user the admin role
    Grant {
        /// Username of the account
        username: String,
    },
    /// Take the admin role away from a user
    Revoke {
        /// Username of the account
        username: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert catalog products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,
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
        Commands::Admin { action } => match action {
            AdminAction::Grant { username } => commands::admin::set_admin(&username, true).await?,
            AdminAction::Revoke { username } => {
                commands::admin::set_admin(&username, false).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                let count = commands::seed::products(&file).await?;
                tracing::info!(count, "Seeded products");
            }
        },
    }
    Ok(())
}
