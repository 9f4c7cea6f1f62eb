//! Andes Market CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! andes-cli migrate
//!
//! # Bootstrap a staff account (a password is generated when -p is omitted)
//! andes-cli user create -e bodega@andes.cl -n "Equipo Bodega" -r staff
//!
//! # Load catalog and shipping configuration
//! andes-cli seed seed/demo.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `ANDES_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "andes-cli")]
#[command(author, version, about = "Andes Market CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load categories, products and shipping configuration from YAML
    Seed {
        /// Path to the seed file
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user with an explicit role
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Full name
        #[arg(short, long)]
        name: String,

        /// Role (`customer`, `staff`, `admin`)
        #[arg(short, long, default_value = "staff")]
        role: String,

        /// Password; generated when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create(&email, &name, &role, password).await?;
            }
        },
        Commands::Seed { file } => commands::seed::run(&file).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_user_create_defaults_to_staff() {
        let cli = Cli::try_parse_from([
            "andes-cli",
            "user",
            "create",
            "-e",
            "bodega@andes.cl",
            "-n",
            "Bodega",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::User {
                action: UserAction::Create { role, password, .. },
            } => {
                assert_eq!(role, "staff");
                assert!(password.is_none());
            }
            _ => panic!("expected user create"),
        }
    }
}
