//! Token Vendor CLI - Local console for the fixed-rate token vendor
//!
//! Reads the same `VENDOR_*` environment (and `.env` file) as the server.
//!
//! # Quick Start
//!
//! ```bash
//! vendor info
//! vendor quote buy 1000000000000000000
//! vendor demo --verbose
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod display;

use commands::{demo, info};

/// Token Vendor CLI - buy and sell tokens against a fixed-rate reserve
#[derive(Parser)]
#[command(name = "vendor")]
#[command(version)]
#[command(about = "Console for the fixed-rate token vendor", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Print engine logs (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configured token, supply and rate
    Info,

    /// Price a trade at the configured rate
    Quote {
        #[command(subcommand)]
        side: QuoteCommands,
    },

    /// Run the buy / approve / sell / withdraw walkthrough in memory
    Demo {
        /// Tokens stocked in the reserve (smallest units)
        #[arg(long, default_value = "1000")]
        reserve: u128,

        /// Tokens per native unit
        #[arg(long, default_value = "1")]
        rate: u128,

        /// Print every event as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// Tokens received for a native amount
    Buy {
        /// Native amount in smallest units
        amount: u128,
    },

    /// Native currency received for a token amount
    Sell {
        /// Token amount in smallest units
        amount: u128,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();

    print_banner();

    match cli.command {
        Commands::Info => info::show_info()?,
        Commands::Quote { side } => match side {
            QuoteCommands::Buy { amount } => info::quote_buy(amount)?,
            QuoteCommands::Sell { amount } => info::quote_sell(amount)?,
        },
        Commands::Demo {
            reserve,
            rate,
            json,
        } => demo::run_demo(reserve, rate, json).await?,
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", "╔══════════════════════════════════════════════╗".bright_cyan());
    println!(
        "{}{}{}",
        "║  ".bright_cyan(),
        "Token Vendor".bright_white().bold(),
        " - fixed-rate buy and sell back      ║".bright_cyan()
    );
    println!("{}", "╚══════════════════════════════════════════════╝".bright_cyan());
    println!();
}
