//! Vendor Core - Canonical types for the token vendor
//!
//! This crate holds the primitives every other vendor crate speaks:
//! - Address: identity of an account, the vendor, or its owner
//! - TokenAmount / NativeAmount: unit-tagged integer quantities
//! - TokenMetadata: name, symbol and decimals of the vended token
//! - VendorError: the single failure taxonomy of the exchange
//!
//! # Invariants
//!
//! 1. Amounts are unsigned and never wrap (checked arithmetic only)
//! 2. Token and native quantities cannot be mixed up at the type level
//! 3. Every failure is a value, never a panic

pub mod types;
pub mod error;

pub use types::*;
pub use error::*;
