//! Configuration and pricing commands

use vendor_engine::{NativeAmount, TokenAmount, VendorConfig};

use crate::display;

/// Show the configuration the server would start with
pub fn show_info() -> anyhow::Result<()> {
    let config = VendorConfig::from_env()?;
    let pricing = config.pricing()?;

    display::section("Vendor Configuration");
    display::labeled("Token", &format!("{} ({})", config.token.name, config.token.symbol));
    display::labeled("Decimals", &config.token.decimals.to_string());
    display::tokens("Total supply", &config.token, config.total_supply);
    display::tokens("Owner allocation", &config.token, config.owner_allocation);
    display::labeled("Rate", &pricing.to_string());
    display::labeled("Owner", config.owner.as_str());
    display::labeled("Vendor address", config.vendor_address.as_str());
    display::labeled("Event history", &config.history_limit.to_string());
    Ok(())
}

pub fn quote_buy(amount: u128) -> anyhow::Result<()> {
    let config = VendorConfig::from_env()?;
    let pricing = config.pricing()?;
    let native = NativeAmount::new(amount);
    let tokens = pricing.native_to_token(native)?;

    display::section("Buy Quote");
    display::native("Pay", native);
    display::tokens("Receive", &config.token, tokens);
    if tokens.is_zero() {
        display::info("Amount is below one token unit at this rate; buy would be rejected");
    }
    Ok(())
}

pub fn quote_sell(amount: u128) -> anyhow::Result<()> {
    let config = VendorConfig::from_env()?;
    let pricing = config.pricing()?;
    let tokens = TokenAmount::new(amount);
    let native = pricing.token_to_native(tokens)?;

    display::section("Sell Quote");
    display::tokens("Sell", &config.token, tokens);
    display::native("Receive", native);
    if native.is_zero() {
        display::info("Amount is below one native unit at this rate; sell would be rejected");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_with_default_config() {
        quote_buy(3).unwrap();
        quote_sell(250).unwrap();
        show_info().unwrap();
    }
}
