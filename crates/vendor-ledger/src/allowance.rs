//! Spending allowances (the approve pattern)
//!
//! `authorize` overwrites: it does not add to an existing allowance. Two
//! racing `authorize` calls let the last writer win, and a spender that
//! consumed part of the old allowance in between may end up with more (or
//! less) authority than the owner intended. This matches the approve
//! pattern callers expect and is left as is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vendor_core::{Address, Result, TokenAmount, VendorError};

/// Allowances keyed by owner, then spender
///
/// A zero allowance is never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowanceBook {
    allowances: HashMap<Address, HashMap<Address, TokenAmount>>,
}

impl AllowanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allowance of `spender` over `owner`'s tokens to exactly `amount`.
    ///
    /// Returns the allowance it replaced.
    pub fn authorize(&mut self, owner: &Address, spender: &Address, amount: TokenAmount) -> TokenAmount {
        let previous = self.allowance_of(owner, spender);

        if amount.is_zero() {
            if let Some(spenders) = self.allowances.get_mut(owner) {
                spenders.remove(spender);
                if spenders.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), amount);
        }

        previous
    }

    /// Remaining allowance of `spender` over `owner`'s tokens
    pub fn allowance_of(&self, owner: &Address, spender: &Address) -> TokenAmount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(TokenAmount::zero())
    }

    /// Verify `amount` is covered without touching the allowance
    pub fn check(&self, owner: &Address, spender: &Address, amount: TokenAmount) -> Result<()> {
        let allowance = self.allowance_of(owner, spender);
        if amount > allowance {
            return Err(VendorError::AllowanceExceeded {
                owner: owner.to_string(),
                spender: spender.to_string(),
                allowance: allowance.0,
                requested: amount.0,
            });
        }
        Ok(())
    }

    /// Spend `amount` of the allowance, returning what remains
    pub fn consume(&mut self, owner: &Address, spender: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        self.check(owner, spender, amount)?;

        let remaining = self
            .allowance_of(owner, spender)
            .checked_sub(amount)
            .ok_or_else(|| VendorError::internal("allowance underflow after check"))?;
        self.authorize(owner, spender, remaining);

        Ok(remaining)
    }

    /// Outstanding allowances granted by `owner`, ordered by spender
    pub fn allowances_of(&self, owner: &Address) -> Vec<(Address, TokenAmount)> {
        let mut granted: Vec<_> = self
            .allowances
            .get(owner)
            .map(|spenders| {
                spenders
                    .iter()
                    .map(|(spender, amount)| (spender.clone(), *amount))
                    .collect()
            })
            .unwrap_or_default();
        granted.sort_by(|a, b| a.0.cmp(&b.0));
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        let book = AllowanceBook::new();
        let owner = Address::new();
        let spender = Address::new();
        assert_eq!(book.allowance_of(&owner, &spender), TokenAmount::zero());
    }

    #[test]
    fn test_authorize_is_absolute() {
        let mut book = AllowanceBook::new();
        let owner = Address::new();
        let spender = Address::new();

        assert_eq!(book.authorize(&owner, &spender, TokenAmount::new(50)), TokenAmount::zero());
        let previous = book.authorize(&owner, &spender, TokenAmount::new(20));

        assert_eq!(previous, TokenAmount::new(50));
        assert_eq!(book.allowance_of(&owner, &spender), TokenAmount::new(20));
    }

    #[test]
    fn test_consume() {
        let mut book = AllowanceBook::new();
        let owner = Address::new();
        let spender = Address::new();
        book.authorize(&owner, &spender, TokenAmount::new(50));

        let remaining = book.consume(&owner, &spender, TokenAmount::new(30)).unwrap();
        assert_eq!(remaining, TokenAmount::new(20));

        let remaining = book.consume(&owner, &spender, TokenAmount::new(20)).unwrap();
        assert_eq!(remaining, TokenAmount::zero());
        assert!(book.allowances_of(&owner).is_empty());
    }

    #[test]
    fn test_consume_exceeding_leaves_allowance() {
        let mut book = AllowanceBook::new();
        let owner = Address::new();
        let spender = Address::new();
        book.authorize(&owner, &spender, TokenAmount::new(10));

        let result = book.consume(&owner, &spender, TokenAmount::new(11));
        assert!(matches!(
            result,
            Err(VendorError::AllowanceExceeded {
                allowance: 10,
                requested: 11,
                ..
            })
        ));
        assert_eq!(book.allowance_of(&owner, &spender), TokenAmount::new(10));
    }

    #[test]
    fn test_allowance_is_per_spender() {
        let mut book = AllowanceBook::new();
        let owner = Address::from("0xowner");
        let vendor = Address::from("0xa-vendor");
        let other = Address::from("0xb-other");
        book.authorize(&owner, &vendor, TokenAmount::new(5));
        book.authorize(&owner, &other, TokenAmount::new(7));

        assert!(book.consume(&owner, &vendor, TokenAmount::new(6)).is_err());
        assert_eq!(
            book.allowances_of(&owner),
            vec![(vendor, TokenAmount::new(5)), (other, TokenAmount::new(7))]
        );
    }

    #[test]
    fn test_zero_revokes() {
        let mut book = AllowanceBook::new();
        let owner = Address::new();
        let spender = Address::new();
        book.authorize(&owner, &spender, TokenAmount::new(5));
        book.authorize(&owner, &spender, TokenAmount::zero());

        assert!(book.allowances_of(&owner).is_empty());
        assert!(book.check(&owner, &spender, TokenAmount::new(1)).is_err());
        assert!(book.check(&owner, &spender, TokenAmount::zero()).is_ok());
    }
}
