//! Vendor configuration

use serde::{Deserialize, Serialize};
use vendor_core::{Address, Result, TokenAmount, TokenMetadata, VendorError};
use vendor_pricing::PricingPolicy;

/// One whole token at 18 decimals
const WHOLE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// 10^38 is the largest power of ten below u128::MAX
const MAX_DECIMALS: u8 = 38;

/// Configuration for a vendor deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    /// Address the vendor trades under (spender in approvals)
    pub vendor_address: Address,
    /// The only address allowed to withdraw native proceeds
    pub owner: Address,
    /// Token name, symbol and decimals
    pub token: TokenMetadata,
    /// Fixed supply minted at genesis
    pub total_supply: TokenAmount,
    /// Part of the supply handed to the owner; the rest stocks the reserve
    pub owner_allocation: TokenAmount,
    /// Token units per `rate_native` native units
    pub tokens_per_native: u128,
    /// Native side of the rate (1 for a plain "tokens per native unit" rate)
    pub rate_native: u128,
    /// Broadcast channel capacity for events
    pub event_capacity: usize,
    /// Number of events retained for history queries
    pub history_limit: usize,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            vendor_address: Address::new(),
            owner: Address::new(),
            token: TokenMetadata::default(),
            total_supply: TokenAmount::new(1000 * WHOLE_TOKEN),
            owner_allocation: TokenAmount::zero(),
            tokens_per_native: 100,
            rate_native: 1,
            event_capacity: 1000,
            history_limit: 500,
        }
    }
}

impl VendorConfig {
    /// Create config from `VENDOR_*` environment variables, defaulting what is unset
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(owner) = std::env::var("VENDOR_OWNER") {
            config.owner = Address::from_string(owner);
        }
        if let Ok(address) = std::env::var("VENDOR_ADDRESS") {
            config.vendor_address = Address::from_string(address);
        }
        if let Ok(name) = std::env::var("VENDOR_TOKEN_NAME") {
            config.token.name = name;
        }
        if let Ok(symbol) = std::env::var("VENDOR_TOKEN_SYMBOL") {
            config.token.symbol = symbol;
        }
        if let Some(decimals) = env_parse("VENDOR_TOKEN_DECIMALS")? {
            config.token.decimals = decimals;
        }
        if let Some(supply) = env_parse("VENDOR_TOTAL_SUPPLY")? {
            config.total_supply = TokenAmount::new(supply);
        }
        if let Some(allocation) = env_parse("VENDOR_OWNER_ALLOCATION")? {
            config.owner_allocation = TokenAmount::new(allocation);
        }
        if let Some(rate) = env_parse("VENDOR_TOKENS_PER_NATIVE")? {
            config.tokens_per_native = rate;
        }
        if let Some(rate_native) = env_parse("VENDOR_RATE_NATIVE")? {
            config.rate_native = rate_native;
        }
        if let Some(capacity) = env_parse("VENDOR_EVENT_CAPACITY")? {
            config.event_capacity = capacity;
        }
        if let Some(limit) = env_parse("VENDOR_HISTORY_LIMIT")? {
            config.history_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_vendor_address(mut self, address: Address) -> Self {
        self.vendor_address = address;
        self
    }

    pub fn with_total_supply(mut self, supply: TokenAmount) -> Self {
        self.total_supply = supply;
        self
    }

    pub fn with_owner_allocation(mut self, allocation: TokenAmount) -> Self {
        self.owner_allocation = allocation;
        self
    }

    pub fn with_rate(mut self, tokens: u128, native: u128) -> Self {
        self.tokens_per_native = tokens;
        self.rate_native = native;
        self
    }

    /// Events and payouts kept for history queries
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Pricing policy described by this config
    pub fn pricing(&self) -> Result<PricingPolicy> {
        PricingPolicy::ratio(self.tokens_per_native, self.rate_native)
    }

    /// Reject configs the vendor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.owner == self.vendor_address {
            return Err(VendorError::invalid_config(
                "owner",
                "owner must differ from the vendor address",
            ));
        }
        if self.owner_allocation > self.total_supply {
            return Err(VendorError::invalid_config(
                "owner_allocation",
                format!(
                    "{} exceeds total supply {}",
                    self.owner_allocation, self.total_supply
                ),
            ));
        }
        if self.token.decimals > MAX_DECIMALS {
            return Err(VendorError::invalid_config(
                "token.decimals",
                format!("at most {} decimals fit in 128 bits", MAX_DECIMALS),
            ));
        }
        if self.event_capacity == 0 {
            return Err(VendorError::invalid_config(
                "event_capacity",
                "must be greater than zero",
            ));
        }
        self.pricing()?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| VendorError::invalid_config(key, format!("cannot parse '{}'", raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VendorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pricing().unwrap(), PricingPolicy::default());
        assert_eq!(config.total_supply, TokenAmount::new(1000 * WHOLE_TOKEN));
    }

    #[test]
    fn test_rejects_over_allocation() {
        let config = VendorConfig::default()
            .with_total_supply(TokenAmount::new(10))
            .with_owner_allocation(TokenAmount::new(11));
        assert!(matches!(
            config.validate(),
            Err(VendorError::InvalidConfig { ref field, .. }) if field == "owner_allocation"
        ));
    }

    #[test]
    fn test_rejects_owner_as_vendor() {
        let address = Address::from("0xsame");
        let config = VendorConfig::default()
            .with_owner(address.clone())
            .with_vendor_address(address);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_rate() {
        let config = VendorConfig::default().with_rate(0, 1);
        assert!(matches!(
            config.validate(),
            Err(VendorError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_env_parse_missing_and_invalid() {
        let missing: Option<u128> = env_parse("VENDOR_TEST_SURELY_UNSET_KEY").unwrap();
        assert!(missing.is_none());

        std::env::set_var("VENDOR_TEST_BAD_NUMBER", "lots");
        let bad: Result<Option<u128>> = env_parse("VENDOR_TEST_BAD_NUMBER");
        assert!(matches!(bad, Err(VendorError::InvalidConfig { .. })));
        std::env::remove_var("VENDOR_TEST_BAD_NUMBER");
    }
}
