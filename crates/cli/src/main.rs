//! PropFee CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! propfee-cli migrate
//!
//! # Create a login (password from PROPFEE_NEW_USER_PASSWORD or --password)
//! propfee-cli user create -u admin -d "管理员" -r admin
//!
//! # Insert the demo departments and staff into an empty database
//! propfee-cli seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create dashboard users
//! - `seed` - Seed demo departments and staff

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "propfee-cli")]
#[command(author, version, about = "PropFee CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage dashboard users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Insert demo departments and staff if the tables are empty
    Seed,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Name shown in the dashboard
        #[arg(short, long)]
        display_name: String,

        /// Role (`admin`, `staff`)
        #[arg(short, long, default_value = "staff")]
        role: String,

        /// Password (defaults to `PROPFEE_NEW_USER_PASSWORD`)
        #[arg(long)]
        password: Option<String>,
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
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                display_name,
                role,
                password,
            } => {
                commands::user::create_user(&username, &display_name, &role, password).await?;
            }
        },
        Commands::Seed => commands::seed::demo_data().await?,
    }
    Ok(())
}
