//! Journal entries and postings
//!
//! A posting is a requested change to one holder. Once committed it is
//! recorded as an immutable `LedgerEntry`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendor_core::{Address, NativeAmount, TokenAmount};

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who a posting lands on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address")]
pub enum Holder {
    /// Token balance of an account
    Account(Address),
    /// Vendor's token holdings
    TokenReserve,
    /// Vendor's native currency holdings
    NativeReserve,
}

impl Holder {
    pub fn unit(&self) -> Unit {
        match self {
            Self::Account(_) | Self::TokenReserve => Unit::Token,
            Self::NativeReserve => Unit::Native,
        }
    }
}

impl std::fmt::Display for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account(address) => write!(f, "{}", address),
            Self::TokenReserve => write!(f, "reserve:token"),
            Self::NativeReserve => write!(f, "reserve:native"),
        }
    }
}

/// Currency a holder is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Token,
    Native,
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to a holder
    Credit,
    /// Debit (decrease) from a holder
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Initial distribution of the fixed supply
    Genesis,
    /// Native in, tokens out
    Buy,
    /// Tokens in, native out
    Sell,
    /// Owner takes native proceeds
    Withdraw,
    /// Token movement between holders
    Transfer,
    /// Tokens handed to the vendor, restocking the reserve
    Donation,
    /// Direct reserve adjustment
    Adjustment,
}

/// A requested change to one holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub holder: Holder,
    pub entry_type: EntryType,
    pub amount: u128,
}

impl Posting {
    pub fn credit_account(account: &Address, amount: TokenAmount) -> Self {
        Self {
            holder: Holder::Account(account.clone()),
            entry_type: EntryType::Credit,
            amount: amount.0,
        }
    }

    pub fn debit_account(account: &Address, amount: TokenAmount) -> Self {
        Self {
            holder: Holder::Account(account.clone()),
            entry_type: EntryType::Debit,
            amount: amount.0,
        }
    }

    pub fn credit_token_reserve(amount: TokenAmount) -> Self {
        Self {
            holder: Holder::TokenReserve,
            entry_type: EntryType::Credit,
            amount: amount.0,
        }
    }

    pub fn debit_token_reserve(amount: TokenAmount) -> Self {
        Self {
            holder: Holder::TokenReserve,
            entry_type: EntryType::Debit,
            amount: amount.0,
        }
    }

    pub fn credit_native_reserve(amount: NativeAmount) -> Self {
        Self {
            holder: Holder::NativeReserve,
            entry_type: EntryType::Credit,
            amount: amount.0,
        }
    }

    pub fn debit_native_reserve(amount: NativeAmount) -> Self {
        Self {
            holder: Holder::NativeReserve,
            entry_type: EntryType::Debit,
            amount: amount.0,
        }
    }
}

/// A single committed posting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub holder: Holder,
    pub unit: Unit,
    pub entry_type: EntryType,
    pub amount: u128,
    pub balance_after: u128,
    pub reason: EntryReason,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}
