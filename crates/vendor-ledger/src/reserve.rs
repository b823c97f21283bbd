//! The vendor's reserve: native and token holdings plus native accounting

use serde::{Deserialize, Serialize};
use vendor_core::{NativeAmount, TokenAmount};

/// Point-in-time view of the reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReserveState {
    pub native: NativeAmount,
    pub token: TokenAmount,
}

impl ReserveState {
    pub fn new(native: u128, token: u128) -> Self {
        Self {
            native: NativeAmount(native),
            token: TokenAmount(token),
        }
    }
}

/// Reserve counters owned by the ledger store
///
/// `native == native_deposited - native_paid_out` holds after every commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reserve {
    pub(crate) native: NativeAmount,
    pub(crate) token: TokenAmount,
    pub(crate) native_deposited: NativeAmount,
    pub(crate) native_paid_out: NativeAmount,
}

impl Reserve {
    pub fn native(&self) -> NativeAmount {
        self.native
    }

    pub fn token(&self) -> TokenAmount {
        self.token
    }

    /// Cumulative native ever credited to the reserve
    pub fn native_deposited(&self) -> NativeAmount {
        self.native_deposited
    }

    /// Cumulative native ever debited from the reserve
    pub fn native_paid_out(&self) -> NativeAmount {
        self.native_paid_out
    }

    pub fn state(&self) -> ReserveState {
        ReserveState {
            native: self.native,
            token: self.token,
        }
    }

    /// Check the native accounting identity
    pub fn native_balanced(&self) -> bool {
        self.native_deposited.checked_sub(self.native_paid_out) == Some(self.native)
    }
}
