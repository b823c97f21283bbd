//! Token Vendor Service
//!
//! A runnable HTTP service exposing a fixed-rate token vendor.
//!
//! ## Endpoints
//!
//! ### Vendor
//! - `GET /v1/vendor` - Token metadata, addresses and rate
//! - `GET /v1/vendor/reserve` - Current reserve
//! - `GET /v1/vendor/audit` - Supply and native accounting check
//! - `GET /v1/vendor/quote/buy?amount=` - Tokens for a native amount
//! - `GET /v1/vendor/quote/sell?amount=` - Native for a token amount
//! - `POST /v1/vendor/buy` - Buy tokens
//! - `POST /v1/vendor/sell` - Sell approved tokens back
//! - `POST /v1/vendor/withdraw` - Owner withdraws native proceeds
//! - `POST /v1/vendor/ownership` - Transfer ownership
//! - `GET /v1/vendor/payouts?limit=` - Recent payouts, newest first
//!
//! ### Token
//! - `GET /v1/token/balance/:account` - Token balance
//! - `GET /v1/token/allowance/:owner/:spender` - Allowance
//! - `GET /v1/token/allowances/:owner` - All allowances granted by an owner
//! - `GET /v1/token/holders` - Non-zero balances
//! - `POST /v1/token/approve` - Set an allowance
//! - `POST /v1/token/transfer` - Transfer own tokens
//! - `POST /v1/token/transfer_from` - Transfer approved tokens
//!
//! ### History
//! - `GET /v1/ledger/entries/:account` - Ledger entries for an account
//! - `GET /v1/ledger/recent` - Recent ledger entries
//! - `GET /v1/events/recent` - Recent events
//! - `GET /v1/events/:account` - Events involving an account
//!
//! ## Usage
//!
//! ```bash
//! VENDOR_OWNER=0xowner cargo run -p vendor-server
//! curl http://localhost:3000/v1/vendor/reserve
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vendor_engine::{Vendor, VendorConfig, VendorEvent};

mod error;
mod routes;

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Token Vendor...");

    let config = VendorConfig::from_env()?;
    let port = match std::env::var("VENDOR_PORT") {
        Ok(raw) => raw.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    let vendor = Arc::new(Vendor::new(config)?);
    tokio::spawn(log_events(vendor.subscribe()));

    let app = routes::router(vendor);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mirror the event stream into the log
async fn log_events(mut rx: broadcast::Receiver<VendorEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::debug!(event = event.event_type(), at = %event.timestamp(), "Vendor event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
