//! Display utilities for the CLI

use colored::*;
use vendor_engine::{NativeAmount, ReserveState, TokenAmount, TokenMetadata, VendorError};

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print a rejected command with its error code
pub fn rejected(message: &str, err: &VendorError) {
    println!(
        "  {} {} {}",
        "✗".bright_red(),
        message,
        format!("[{}] {}", err.error_code(), err).bright_red()
    );
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a labeled value
pub fn labeled(label: &str, value: &str) {
    println!("  {}: {}", label.bright_white(), value.bright_cyan());
}

/// Print a token amount both raw and in whole tokens
pub fn tokens(label: &str, token: &TokenMetadata, amount: TokenAmount) {
    labeled(label, &format!("{} ({})", amount.0, token.format(amount)));
}

pub fn native(label: &str, amount: NativeAmount) {
    labeled(label, &amount.to_string());
}

pub fn reserve(token: &TokenMetadata, reserve: &ReserveState) {
    native("Reserve (native)", reserve.native);
    tokens("Reserve (token)", token, reserve.token);
}
