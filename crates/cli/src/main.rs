//! Codform CLI - Database migrations and offline tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! codform-cli migrate
//!
//! # Price 3 units at 24.90 with 10% off and 4.99 shipping
//! codform-cli quote --price 24.90 --quantity 3 --percent 10 --shipping 4.99
//!
//! # Validate a shop configuration file
//! codform-cli check-config settings.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `quote` - Print a price quote with the checkout calculator
//! - `check-config` - Validate a shop configuration JSON file

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "codform-cli")]
#[command(author, version, about = "Codform CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print a price quote
    Quote(QuoteArgs),
    /// Validate a shop configuration JSON file
    CheckConfig {
        /// Path to the configuration file
        file: PathBuf,
    },
}

#[derive(Args)]
struct QuoteArgs {
    /// Unit price
    #[arg(long)]
    price: Decimal,

    /// Quantity
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Percentage discount
    #[arg(long, conflicts_with = "fixed")]
    percent: Option<Decimal>,

    /// Fixed discount amount
    #[arg(long)]
    fixed: Option<Decimal>,

    /// Shipping price
    #[arg(long, default_value_t = Decimal::ZERO)]
    shipping: Decimal,

    /// Print the quote as JSON
    #[arg(long)]
    json: bool,
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
        Commands::Quote(args) => {
            let discount = commands::quote::discount(args.percent, args.fixed);
            let quote = commands::quote::quote(args.price, args.quantity, discount, args.shipping);
            commands::quote::print(&quote, args.json)?;
        }
        Commands::CheckConfig { file } => commands::check_config::run(&file)?,
    }
    Ok(())
}
