//! Vendor Engine - Fixed-rate token vending machine
//!
//! The vendor holds a reserve of native currency and tokens and trades
//! against it at a rate fixed at construction:
//!
//! 1. `buy` takes native currency and hands out tokens from the reserve
//! 2. `sell` pulls approved tokens back and pays native currency out
//! 3. `withdraw` lets the owner take accumulated native proceeds
//!
//! # Staging
//!
//! Every command runs in three steps:
//!
//! ```text
//! validate + plan  ->  commit ledger (lock held)  ->  pay out  ->  notify
//! ```
//!
//! The state lock is released before the payout, and no observer runs
//! between commit and payout. A payout sink that re-enters the vendor sees
//! the committed state, so a second withdrawal of the same funds fails.
//! Each command claims its event sequence number before releasing the lock,
//! so subscribers see events in commit order.
//!
//! The vendor's own address is not a trading party: it cannot buy, sell,
//! grant allowances, or be the source or spender of a transfer. Tokens sent
//! to it restock the reserve.
//!
//! # Invariants
//!
//! 1. Account balances + token reserve == total supply, always
//! 2. Native reserve == native deposited - native paid out, never negative
//! 3. Rounding never favours the user
//! 4. A failed command leaves balances, reserves and allowances untouched

pub mod config;
pub mod events;
pub mod payout;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use config::VendorConfig;
pub use events::{EventBus, VendorEvent};
pub use payout::{InMemoryPayouts, Payout, PayoutReason, PayoutSink, DEFAULT_PAYOUT_HISTORY};
pub use vendor_core::{Address, NativeAmount, Result, TokenAmount, TokenMetadata, VendorError};
pub use vendor_ledger::{EntryId, LedgerEntry, ReserveState, SupplyAudit};
pub use vendor_pricing::PricingPolicy;

use vendor_ledger::{AllowanceBook, EntryReason, LedgerStore, Posting};

/// Kind of operation a receipt settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptKind {
    Buy,
    Sell,
    Withdraw,
    Transfer,
}

/// Proof of a settled command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub kind: ReceiptKind,
    /// Buyer, seller, withdrawing owner, or transfer source
    pub account: Address,
    pub native_amount: NativeAmount,
    pub token_amount: TokenAmount,
    pub reserve_after: ReserveState,
    pub entry_ids: Vec<EntryId>,
    pub executed_at: DateTime<Utc>,
}

/// State guarded by the single writer lock
struct VendorState {
    ledger: LedgerStore,
    allowances: AllowanceBook,
    owner: Address,
}

/// The token vendor
///
/// Thread-safe; share it behind an `Arc`.
pub struct Vendor {
    address: Address,
    token: TokenMetadata,
    pricing: PricingPolicy,
    state: RwLock<VendorState>,
    payouts: Arc<dyn PayoutSink>,
    events: EventBus,
}

impl Vendor {
    /// Create a vendor paying out into an in-memory sink that keeps the
    /// last `history_limit` payouts
    pub fn new(config: VendorConfig) -> Result<Self> {
        let payouts = Arc::new(InMemoryPayouts::with_limit(config.history_limit));
        Self::with_payout_sink(config, payouts)
    }

    /// Create a vendor delivering payouts to `payouts`
    pub fn with_payout_sink(config: VendorConfig, payouts: Arc<dyn PayoutSink>) -> Result<Self> {
        config.validate()?;
        let pricing = config.pricing()?;

        let allocations = if config.owner_allocation.is_zero() {
            vec![]
        } else {
            vec![(config.owner.clone(), config.owner_allocation)]
        };
        let ledger = LedgerStore::genesis(config.total_supply, &allocations)?;

        info!(
            vendor = %config.vendor_address,
            owner = %config.owner,
            symbol = %config.token.symbol,
            total_supply = %config.total_supply,
            rate = %pricing,
            "Vendor initialized"
        );

        Ok(Self {
            address: config.vendor_address,
            token: config.token,
            pricing,
            state: RwLock::new(VendorState {
                ledger,
                allowances: AllowanceBook::new(),
                owner: config.owner,
            }),
            payouts,
            events: EventBus::new(config.event_capacity, config.history_limit),
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Address the vendor trades under; approvals for `sell` name it as spender
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn token_metadata(&self) -> &TokenMetadata {
        &self.token
    }

    pub fn pricing(&self) -> PricingPolicy {
        self.pricing
    }

    pub fn owner(&self) -> Address {
        self.state.read().owner.clone()
    }

    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.state.read().ledger.balance_of(account)
    }

    pub fn allowance_of(&self, owner: &Address, spender: &Address) -> TokenAmount {
        self.state.read().allowances.allowance_of(owner, spender)
    }

    /// Outstanding allowances granted by `owner`
    pub fn allowances_of(&self, owner: &Address) -> Vec<(Address, TokenAmount)> {
        self.state.read().allowances.allowances_of(owner)
    }

    pub fn reserve_state(&self) -> ReserveState {
        self.state.read().ledger.reserve_state()
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.state.read().ledger.total_supply()
    }

    /// Tokens `buy` would deliver for `native_amount`
    pub fn quote_buy(&self, native_amount: NativeAmount) -> Result<TokenAmount> {
        let quote = self.pricing.native_to_token(native_amount)?;
        debug!(native = %native_amount, tokens = %quote, "Buy quote");
        Ok(quote)
    }

    /// Native currency `sell` would pay for `token_amount`
    pub fn quote_sell(&self, token_amount: TokenAmount) -> Result<NativeAmount> {
        let quote = self.pricing.token_to_native(token_amount)?;
        debug!(tokens = %token_amount, native = %quote, "Sell quote");
        Ok(quote)
    }

    /// Accounts with a non-zero balance
    pub fn holders(&self) -> Vec<(Address, TokenAmount)> {
        self.state.read().ledger.holders()
    }

    pub fn account_entries(&self, account: &Address) -> Vec<LedgerEntry> {
        self.state.read().ledger.account_entries(account)
    }

    /// Ledger entries, newest first
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.state.read().ledger.recent_entries(limit)
    }

    /// Events, newest first
    pub fn recent_events(&self, limit: usize) -> Vec<VendorEvent> {
        self.events.recent(limit)
    }

    /// Events involving `account`, newest first
    pub fn account_events(&self, account: &Address, limit: usize) -> Vec<VendorEvent> {
        self.events.for_account(account, limit)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VendorEvent> {
        self.events.subscribe()
    }

    /// Payouts delivered to the sink, newest first
    pub fn recent_payouts(&self, limit: usize) -> Vec<Payout> {
        self.payouts.recent(limit)
    }

    /// Recompute supply conservation and native accounting
    pub fn audit(&self) -> Result<SupplyAudit> {
        self.state.read().ledger.audit()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Set `spender`'s allowance over `owner`'s tokens to exactly `amount`.
    ///
    /// Overwrites rather than adds; returns the allowance it replaced.
    pub fn authorize(
        &self,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        let result = self.not_vendor(owner);
        rejected("authorize", owner, result)?;

        let (previous, sequence) = {
            let mut state = self.state.write();
            let previous = state.allowances.authorize(owner, spender, amount);
            (previous, self.events.reserve_sequence())
        };

        info!(%owner, %spender, %amount, %previous, "Allowance set");
        self.events.publish_at(
            sequence,
            VendorEvent::Approval {
                owner: owner.clone(),
                spender: spender.clone(),
                amount,
                previous,
                timestamp: Utc::now(),
            },
        );
        Ok(previous)
    }

    /// Pay `native_amount` into the reserve and receive tokens at the fixed rate
    pub fn buy(&self, buyer: &Address, native_amount: NativeAmount) -> Result<Receipt> {
        let result = self.try_buy(buyer, native_amount);
        rejected("buy", buyer, result)
    }

    fn try_buy(&self, buyer: &Address, native_amount: NativeAmount) -> Result<Receipt> {
        self.not_vendor(buyer)?;
        if native_amount.is_zero() {
            return Err(VendorError::invalid_amount("Native amount must be greater than zero"));
        }
        let token_amount = self.pricing.native_to_token(native_amount)?;
        if token_amount.is_zero() {
            return Err(VendorError::ZeroQuote {
                input: native_amount.0,
            });
        }

        let receipt_id = new_receipt_id();
        let (receipt, sequence) = {
            let mut state = self.state.write();
            let batch = state.ledger.plan(vec![
                Posting::debit_token_reserve(token_amount),
                Posting::credit_native_reserve(native_amount),
                Posting::credit_account(buyer, token_amount),
            ])?;
            let entry_ids = state.ledger.commit(batch, EntryReason::Buy, &receipt_id)?;

            let receipt = Receipt {
                receipt_id,
                kind: ReceiptKind::Buy,
                account: buyer.clone(),
                native_amount,
                token_amount,
                reserve_after: state.ledger.reserve_state(),
                entry_ids,
                executed_at: Utc::now(),
            };
            (receipt, self.events.reserve_sequence())
        };

        info!(
            receipt = %receipt.receipt_id,
            %buyer,
            native = %native_amount,
            tokens = %token_amount,
            "Tokens bought"
        );
        self.events.publish_at(
            sequence,
            VendorEvent::TokensBought {
                buyer: buyer.clone(),
                native_amount,
                token_amount,
                reserve: receipt.reserve_after,
                timestamp: receipt.executed_at,
            },
        );
        Ok(receipt)
    }

    /// Return approved tokens to the reserve and get paid native currency.
    ///
    /// The seller must first `authorize` the vendor's address for at least
    /// `token_amount`.
    pub fn sell(&self, seller: &Address, token_amount: TokenAmount) -> Result<Receipt> {
        let result = self.try_sell(seller, token_amount);
        rejected("sell", seller, result)
    }

    fn try_sell(&self, seller: &Address, token_amount: TokenAmount) -> Result<Receipt> {
        self.not_vendor(seller)?;
        if token_amount.is_zero() {
            return Err(VendorError::invalid_amount("Token amount must be greater than zero"));
        }
        let native_amount = self.pricing.token_to_native(token_amount)?;
        if native_amount.is_zero() {
            return Err(VendorError::ZeroQuote {
                input: token_amount.0,
            });
        }

        let receipt_id = new_receipt_id();
        let (receipt, payout, sequence) = {
            let mut state = self.state.write();
            state.allowances.check(seller, &self.address, token_amount)?;

            let batch = state.ledger.plan(vec![
                Posting::debit_native_reserve(native_amount),
                Posting::debit_account(seller, token_amount),
                Posting::credit_token_reserve(token_amount),
            ])?;

            let previous = state.allowances.allowance_of(seller, &self.address);
            state.allowances.consume(seller, &self.address, token_amount)?;
            let entry_ids = match state.ledger.commit(batch, EntryReason::Sell, &receipt_id) {
                Ok(ids) => ids,
                Err(e) => {
                    state.allowances.authorize(seller, &self.address, previous);
                    return Err(e);
                }
            };

            let receipt = Receipt {
                receipt_id: receipt_id.clone(),
                kind: ReceiptKind::Sell,
                account: seller.clone(),
                native_amount,
                token_amount,
                reserve_after: state.ledger.reserve_state(),
                entry_ids,
                executed_at: Utc::now(),
            };
            let payout = Payout::new(
                seller.clone(),
                native_amount,
                PayoutReason::SellProceeds,
                receipt_id,
            );
            (receipt, payout, self.events.reserve_sequence())
        };

        self.deliver(&payout);

        info!(
            receipt = %receipt.receipt_id,
            %seller,
            tokens = %token_amount,
            native = %native_amount,
            "Tokens sold"
        );
        self.events.publish_at(
            sequence,
            VendorEvent::TokensSold {
                seller: seller.clone(),
                token_amount,
                native_amount,
                reserve: receipt.reserve_after,
                timestamp: receipt.executed_at,
            },
        );
        Ok(receipt)
    }

    /// Owner takes `native_amount` out of the reserve
    pub fn withdraw(&self, caller: &Address, native_amount: NativeAmount) -> Result<Receipt> {
        let result = self.try_withdraw(caller, |_| Ok(native_amount));
        rejected("withdraw", caller, result)
    }

    /// Owner takes the entire native reserve
    pub fn withdraw_all(&self, caller: &Address) -> Result<Receipt> {
        let result = self.try_withdraw(caller, |reserve| {
            if reserve.native.is_zero() {
                return Err(VendorError::invalid_amount("Native reserve is empty"));
            }
            Ok(reserve.native)
        });
        rejected("withdraw", caller, result)
    }

    fn try_withdraw<F>(&self, caller: &Address, amount_for: F) -> Result<Receipt>
    where
        F: FnOnce(&ReserveState) -> Result<NativeAmount>,
    {
        let receipt_id = new_receipt_id();
        let (receipt, payout, sequence) = {
            let mut state = self.state.write();
            if caller != &state.owner {
                return Err(VendorError::Unauthorized {
                    caller: caller.to_string(),
                });
            }

            let native_amount = amount_for(&state.ledger.reserve_state())?;
            if native_amount.is_zero() {
                return Err(VendorError::invalid_amount("Withdrawal must be greater than zero"));
            }

            let batch = state
                .ledger
                .plan(vec![Posting::debit_native_reserve(native_amount)])?;
            let entry_ids = state.ledger.commit(batch, EntryReason::Withdraw, &receipt_id)?;

            let receipt = Receipt {
                receipt_id: receipt_id.clone(),
                kind: ReceiptKind::Withdraw,
                account: caller.clone(),
                native_amount,
                token_amount: TokenAmount::zero(),
                reserve_after: state.ledger.reserve_state(),
                entry_ids,
                executed_at: Utc::now(),
            };
            let payout = Payout::new(
                state.owner.clone(),
                native_amount,
                PayoutReason::Withdrawal,
                receipt_id,
            );
            (receipt, payout, self.events.reserve_sequence())
        };

        self.deliver(&payout);

        info!(
            receipt = %receipt.receipt_id,
            owner = %caller,
            native = %receipt.native_amount,
            "Proceeds withdrawn"
        );
        self.events.publish_at(
            sequence,
            VendorEvent::Withdrawn {
                owner: caller.clone(),
                native_amount: receipt.native_amount,
                reserve: receipt.reserve_after,
                timestamp: receipt.executed_at,
            },
        );
        Ok(receipt)
    }

    /// Move `from`'s own tokens to `to`.
    ///
    /// Tokens sent to the vendor's address land in the token reserve and are
    /// journaled as a donation.
    pub fn transfer(&self, from: &Address, to: &Address, amount: TokenAmount) -> Result<Receipt> {
        let result = self.try_transfer(None, from, to, amount);
        rejected("transfer", from, result)
    }

    /// Move `owner`'s tokens to `to` on the strength of `spender`'s allowance
    pub fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<Receipt> {
        let result = self.try_transfer(Some(spender), owner, to, amount);
        rejected("transfer_from", spender, result)
    }

    fn try_transfer(
        &self,
        spender: Option<&Address>,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<Receipt> {
        self.not_vendor(from)?;
        if let Some(spender) = spender {
            self.not_vendor(spender)?;
        }
        if amount.is_zero() {
            return Err(VendorError::invalid_amount("Transfer amount must be greater than zero"));
        }

        let (credit, reason) = if to == &self.address {
            (Posting::credit_token_reserve(amount), EntryReason::Donation)
        } else {
            (Posting::credit_account(to, amount), EntryReason::Transfer)
        };

        let receipt_id = new_receipt_id();
        let (receipt, sequence) = {
            let mut state = self.state.write();
            if let Some(spender) = spender {
                state.allowances.check(from, spender, amount)?;
            }

            let batch = state
                .ledger
                .plan(vec![Posting::debit_account(from, amount), credit])?;

            let restore = match spender {
                Some(spender) => {
                    let previous = state.allowances.allowance_of(from, spender);
                    state.allowances.consume(from, spender, amount)?;
                    Some((spender, previous))
                }
                None => None,
            };
            let entry_ids = match state.ledger.commit(batch, reason, &receipt_id) {
                Ok(ids) => ids,
                Err(e) => {
                    if let Some((spender, previous)) = restore {
                        state.allowances.authorize(from, spender, previous);
                    }
                    return Err(e);
                }
            };

            let receipt = Receipt {
                receipt_id,
                kind: ReceiptKind::Transfer,
                account: from.clone(),
                native_amount: NativeAmount::zero(),
                token_amount: amount,
                reserve_after: state.ledger.reserve_state(),
                entry_ids,
                executed_at: Utc::now(),
            };
            (receipt, self.events.reserve_sequence())
        };

        info!(receipt = %receipt.receipt_id, %from, %to, %amount, "Tokens transferred");
        self.events.publish_at(
            sequence,
            VendorEvent::Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
                timestamp: receipt.executed_at,
            },
        );
        Ok(receipt)
    }

    /// Hand the withdrawal privilege to `new_owner`
    pub fn transfer_ownership(&self, caller: &Address, new_owner: &Address) -> Result<()> {
        let result = {
            let mut state = self.state.write();
            if caller != &state.owner {
                Err(VendorError::Unauthorized {
                    caller: caller.to_string(),
                })
            } else {
                self.not_vendor(new_owner).map(|()| {
                    state.owner = new_owner.clone();
                    self.events.reserve_sequence()
                })
            }
        };
        let sequence = rejected("transfer_ownership", caller, result)?;

        info!(previous_owner = %caller, %new_owner, "Ownership transferred");
        self.events.publish_at(
            sequence,
            VendorEvent::OwnershipTransferred {
                previous_owner: caller.clone(),
                new_owner: new_owner.clone(),
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    fn not_vendor(&self, address: &Address) -> Result<()> {
        if address == &self.address {
            return Err(VendorError::ReservedAddress {
                address: address.to_string(),
            });
        }
        Ok(())
    }

    fn deliver(&self, payout: &Payout) {
        debug!(
            payout = %payout.payout_id,
            recipient = %payout.recipient,
            amount = %payout.amount,
            reason = ?payout.reason,
            "Delivering payout"
        );
        self.payouts.pay(payout);
    }
}

fn new_receipt_id() -> String {
    format!("receipt_{}", Uuid::new_v4())
}

/// Log a rejected command and pass the result through
fn rejected<T>(operation: &str, account: &Address, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(operation, %account, code = e.error_code(), "Command rejected: {}", e);
    }
    result
}
