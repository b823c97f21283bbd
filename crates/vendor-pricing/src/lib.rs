//! Vendor Pricing - Fixed exchange rate between native currency and token
//!
//! The rate is the ratio `tokens : native`, fixed at construction. Both
//! conversions truncate, so a round trip never returns more than it was
//! given:
//!
//! ```text
//! token_to_native(native_to_token(x)) <= x
//! ```

use serde::{Deserialize, Serialize};
use vendor_core::{NativeAmount, Result, TokenAmount, VendorError};

/// Immutable exchange rate: `tokens` smallest token units per `native`
/// smallest native units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    tokens: u128,
    native: u128,
}

impl PricingPolicy {
    /// Rate of `tokens_per_native` token units for each native unit
    pub fn new(tokens_per_native: u128) -> Result<Self> {
        Self::ratio(tokens_per_native, 1)
    }

    /// Rate of `tokens` token units for every `native` native units
    pub fn ratio(tokens: u128, native: u128) -> Result<Self> {
        if tokens == 0 || native == 0 {
            return Err(VendorError::InvalidRate { tokens, native });
        }
        Ok(Self { tokens, native })
    }

    pub fn tokens(&self) -> u128 {
        self.tokens
    }

    pub fn native(&self) -> u128 {
        self.native
    }

    /// Tokens delivered for `native_amount`, rounded down
    pub fn native_to_token(&self, native_amount: NativeAmount) -> Result<TokenAmount> {
        scale(native_amount.0, self.tokens, self.native).map(TokenAmount)
    }

    /// Native paid for `token_amount`, rounded down
    pub fn token_to_native(&self, token_amount: TokenAmount) -> Result<NativeAmount> {
        scale(token_amount.0, self.native, self.tokens).map(NativeAmount)
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tokens: 100,
            native: 1,
        }
    }
}

impl std::fmt::Display for PricingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tokens per {} native", self.tokens, self.native)
    }
}

/// floor(value * num / den) without intermediate wrap
fn scale(value: u128, num: u128, den: u128) -> Result<u128> {
    value
        .checked_mul(num)
        .map(|product| product / den)
        .ok_or_else(|| VendorError::overflow(format!("{} * {} exceeds u128", value, num)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unit_rate() {
        let policy = PricingPolicy::new(1).unwrap();
        assert_eq!(
            policy.native_to_token(NativeAmount::new(100)).unwrap(),
            TokenAmount::new(100)
        );
        assert_eq!(
            policy.token_to_native(TokenAmount::new(50)).unwrap(),
            NativeAmount::new(50)
        );
    }

    #[test]
    fn test_default_rate() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.tokens(), 100);
        assert_eq!(
            policy.native_to_token(NativeAmount::new(3)).unwrap(),
            TokenAmount::new(300)
        );
        // 150 tokens are worth 1.5 native, truncated to 1
        assert_eq!(
            policy.token_to_native(TokenAmount::new(150)).unwrap(),
            NativeAmount::new(1)
        );
        // dust sells for nothing
        assert_eq!(
            policy.token_to_native(TokenAmount::new(99)).unwrap(),
            NativeAmount::zero()
        );
    }

    #[test]
    fn test_fractional_rate_truncates() {
        // 2 tokens per 3 native
        let policy = PricingPolicy::ratio(2, 3).unwrap();
        assert_eq!(
            policy.native_to_token(NativeAmount::new(4)).unwrap(),
            TokenAmount::new(2)
        );
        assert_eq!(
            policy.token_to_native(TokenAmount::new(2)).unwrap(),
            NativeAmount::new(3)
        );
        assert_eq!(
            policy.native_to_token(NativeAmount::new(1)).unwrap(),
            TokenAmount::zero()
        );
    }

    #[test]
    fn test_invalid_rate() {
        assert_eq!(
            PricingPolicy::ratio(0, 1),
            Err(VendorError::InvalidRate { tokens: 0, native: 1 })
        );
        assert!(PricingPolicy::ratio(5, 0).is_err());
        assert!(PricingPolicy::new(0).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let policy = PricingPolicy::new(u128::MAX).unwrap();
        let result = policy.native_to_token(NativeAmount::new(2));
        assert!(matches!(result, Err(VendorError::AmountOverflow { .. })));
    }

    proptest! {
        #[test]
        fn property_round_trip_never_creates_value(
            tokens in 1u128..1_000_000,
            native in 1u128..1_000_000,
            amount in 0u128..1_000_000_000_000,
        ) {
            let policy = PricingPolicy::ratio(tokens, native).unwrap();
            let bought = policy.native_to_token(NativeAmount::new(amount)).unwrap();
            let back = policy.token_to_native(bought).unwrap();
            prop_assert!(back.0 <= amount);

            let paid = policy.token_to_native(TokenAmount::new(amount)).unwrap();
            let rebought = policy.native_to_token(paid).unwrap();
            prop_assert!(rebought.0 <= amount);
        }
    }
}
