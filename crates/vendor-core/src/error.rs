//! Error types for the token vendor
//!
//! Every failure is a value returned to the caller. A failed operation
//! leaves the ledger exactly as it was before the call.

use thiserror::Error;

/// Result type for vendor operations
pub type Result<T> = std::result::Result<T, VendorError>;

/// Vendor error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VendorError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Amount failed a precondition (e.g. must be positive)
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Pricing produced a zero output for a positive input
    #[error("Quote for {input} rounds down to zero")]
    ZeroQuote { input: u128 },

    /// Arithmetic would leave the 128-bit range
    #[error("Amount overflow: {message}")]
    AmountOverflow { message: String },

    /// Exchange rate with a zero side
    #[error("Invalid rate: {tokens} tokens per {native} native")]
    InvalidRate { tokens: u128, native: u128 },

    /// The vendor's own address cannot act as a trading party
    #[error("Reserved address: {address} belongs to the vendor")]
    ReservedAddress { address: String },

    /// Configuration rejected at construction
    #[error("Invalid config: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // ========================================================================
    // Balance Errors
    // ========================================================================

    /// Account holds fewer tokens than requested
    #[error("Insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: String,
        available: u128,
        required: u128,
    },

    /// Vendor cannot pay out the requested native amount
    #[error("Insufficient native reserve: have {available}, need {required}")]
    InsufficientNativeReserve { available: u128, required: u128 },

    /// Vendor cannot deliver the requested token amount
    #[error("Insufficient token reserve: have {available}, need {required}")]
    InsufficientTokenReserve { available: u128, required: u128 },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Spend exceeds what the owner approved for this spender
    #[error("Allowance exceeded: {owner} approved {spender} for {allowance}, requested {requested}")]
    AllowanceExceeded {
        owner: String,
        spender: String,
        allowance: u128,
        requested: u128,
    },

    /// Caller lacks the privilege for this command
    #[error("Unauthorized: {caller} is not the vendor owner")]
    Unauthorized { caller: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Token postings in a batch would mint or burn supply
    #[error("Unbalanced batch: {credits} token credits against {debits} debits")]
    UnbalancedBatch { credits: u128, debits: u128 },

    /// Internal consistency failure (never leaves partial state behind)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VendorError {
    /// Create an invalid amount error
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::AmountOverflow {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether resubmitting the same call could succeed without any other change.
    ///
    /// Nothing is retried internally; this only guides callers.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::ZeroQuote { .. } => "ZERO_QUOTE",
            Self::AmountOverflow { .. } => "AMOUNT_OVERFLOW",
            Self::InvalidRate { .. } => "INVALID_RATE",
            Self::ReservedAddress { .. } => "RESERVED_ADDRESS",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientNativeReserve { .. } => "INSUFFICIENT_NATIVE_RESERVE",
            Self::InsufficientTokenReserve { .. } => "INSUFFICIENT_TOKEN_RESERVE",
            Self::AllowanceExceeded { .. } => "ALLOWANCE_EXCEEDED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::UnbalancedBatch { .. } => "UNBALANCED_BATCH",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
