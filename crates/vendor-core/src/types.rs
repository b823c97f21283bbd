//! Canonical types for the token vendor
//!
//! Quantities are kept in the smallest unit of their currency. Token and
//! native amounts are distinct newtypes so a quote can never be credited
//! in the wrong unit.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identity Types
// ============================================================================

/// Public address of an account, the vendor itself, or its owner
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Generate a fresh random address
    pub fn new() -> Self {
        Self(format!("0x{}", Uuid::new_v4().simple()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Amount Types
// ============================================================================

/// Quantity of the vended token, in its smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tok", self.0)
    }
}

/// Quantity of the native chain currency, in its smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NativeAmount(pub u128);

impl NativeAmount {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NativeAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

// ============================================================================
// Token Metadata
// ============================================================================

/// Descriptive metadata of the vended token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    /// Display precision; balances are always stored in smallest units
    pub decimals: u8,
}

impl TokenMetadata {
    /// Number of smallest units in one whole token
    pub fn unit(&self) -> u128 {
        10u128.pow(self.decimals as u32)
    }

    /// Render a raw amount as a whole-token decimal string
    pub fn format(&self, amount: TokenAmount) -> String {
        if self.decimals == 0 {
            return format!("{} {}", amount.0, self.symbol);
        }
        let unit = self.unit();
        let whole = amount.0 / unit;
        let frac = amount.0 % unit;
        format!(
            "{}.{:0>width$} {}",
            whole,
            frac,
            self.symbol,
            width = self.decimals as usize
        )
    }
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "Gold".to_string(),
            symbol: "GLD".to_string(),
            decimals: 18,
        }
    }
}
