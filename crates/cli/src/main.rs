//! Ecom24 CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ecom24-cli migrate
//!
//! # Give a registered user the admin role
//! ecom24-cli user promote <uid>
//!
//! # Take it away again
//! ecom24-cli user demote <uid>
//!
//! # Insert demo products
//! ecom24-cli seed --count 20
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ecom24-cli")]
#[command(author, version, about = "Ecom24 CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user roles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Insert demo products into the catalog
    Seed {
        /// Number of products to create
        #[arg(short, long, default_value_t = 10)]
        count: u32,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Grant the admin role
    Promote {
        /// Identity provider uid of the user
        uid: String,
    },
    /// Revoke the admin role
    Demote {
        /// Identity provider uid of the user
        uid: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Promote { uid } => {
                commands::user::set_role(&uid, ecom24_core::Role::Admin).await?;
            }
            UserAction::Demote { uid } => {
                commands::user::set_role(&uid, ecom24_core::Role::User).await?;
            }
        },
        Commands::Seed { count } => commands::seed::products(count).await?,
    }
    Ok(())
}
