//! Vendor Ledger - State store for the token vendor
//!
//! The ledger is:
//! - Single-currency for accounts (token balances only)
//! - Reserve-aware (the vendor's native and token holdings)
//! - Batch-atomic (a set of postings commits entirely or not at all)
//! - Immutable in history (entries are append-only)
//!
//! # Invariants
//!
//! 1. No negative balances or reserves
//! 2. Sum of account balances + token reserve == total supply
//! 3. Native reserve == native deposited - native paid out
//! 4. A failed plan or commit leaves the store untouched
//!
//! The store holds no lock of its own. Its owner serializes access and
//! plans/commits within one critical section.

pub mod allowance;
pub mod journal;
pub mod reserve;

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;
use vendor_core::{Address, NativeAmount, Result, TokenAmount, VendorError};

pub use allowance::AllowanceBook;
pub use journal::{EntryId, EntryReason, EntryType, Holder, LedgerEntry, Posting, Unit};
pub use reserve::{Reserve, ReserveState};

/// A posting with its validated resulting balance
#[derive(Debug, Clone)]
struct PlannedLine {
    posting: Posting,
    balance_after: u128,
}

/// Postings validated against one ledger version, ready to commit
#[derive(Debug, Clone)]
pub struct LedgerBatch {
    version: u64,
    lines: Vec<PlannedLine>,
    native_deposited: NativeAmount,
    native_paid_out: NativeAmount,
}

impl LedgerBatch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Ledger version this batch was planned against
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Result of recomputing the ledger's holdings
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SupplyAudit {
    pub total_supply: TokenAmount,
    /// Sum of all account balances
    pub circulating: TokenAmount,
    pub reserve_token: TokenAmount,
    pub reserve_native: NativeAmount,
    pub native_deposited: NativeAmount,
    pub native_paid_out: NativeAmount,
}

impl SupplyAudit {
    pub fn supply_conserved(&self) -> bool {
        self.circulating.checked_add(self.reserve_token) == Some(self.total_supply)
    }

    pub fn native_balanced(&self) -> bool {
        self.native_deposited.checked_sub(self.native_paid_out) == Some(self.reserve_native)
    }

    pub fn is_sound(&self) -> bool {
        self.supply_conserved() && self.native_balanced()
    }
}

/// The vendor ledger store
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    /// Token balance per account
    balances: HashMap<Address, TokenAmount>,
    /// Vendor holdings
    reserve: Reserve,
    /// Fixed at genesis
    total_supply: TokenAmount,
    /// All entries (append-only)
    entries: Vec<LedgerEntry>,
    /// Bumped on every commit
    version: u64,
}

impl LedgerStore {
    /// Create an empty ledger with no supply
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the fixed supply once, distributing it between accounts and the token reserve.
    ///
    /// Whatever the allocations leave over goes to the reserve.
    pub fn genesis(total_supply: TokenAmount, allocations: &[(Address, TokenAmount)]) -> Result<Self> {
        let mut allocated = TokenAmount::zero();
        for (_, amount) in allocations {
            allocated = allocated
                .checked_add(*amount)
                .ok_or_else(|| VendorError::overflow("genesis allocations overflow"))?;
        }
        let reserve_tokens = total_supply.checked_sub(allocated).ok_or_else(|| {
            VendorError::invalid_config(
                "allocations",
                format!("{} allocated exceeds total supply {}", allocated, total_supply),
            )
        })?;

        let mut postings = Vec::with_capacity(allocations.len() + 1);
        if !reserve_tokens.is_zero() {
            postings.push(Posting::credit_token_reserve(reserve_tokens));
        }
        for (account, amount) in allocations {
            if !amount.is_zero() {
                postings.push(Posting::credit_account(account, *amount));
            }
        }

        let mut store = Self {
            total_supply,
            ..Self::default()
        };
        if !postings.is_empty() {
            // Minting is the one batch allowed to create tokens
            let batch = store.plan_postings(postings, false)?;
            store.commit(batch, EntryReason::Genesis, "genesis")?;
        }
        Ok(store)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Token balance of an account (zero if never referenced)
    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.balances
            .get(account)
            .copied()
            .unwrap_or(TokenAmount::zero())
    }

    pub fn reserve(&self) -> &Reserve {
        &self.reserve
    }

    pub fn reserve_state(&self) -> ReserveState {
        self.reserve.state()
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Accounts with a non-zero balance, ordered by address
    pub fn holders(&self) -> Vec<(Address, TokenAmount)> {
        let mut holders: Vec<_> = self
            .balances
            .iter()
            .filter(|(_, balance)| !balance.is_zero())
            .map(|(account, balance)| (account.clone(), *balance))
            .collect();
        holders.sort_by(|a, b| a.0.cmp(&b.0));
        holders
    }

    /// Get all entries for an account
    pub fn account_entries(&self, account: &Address) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(&e.holder, Holder::Account(a) if a == account))
            .cloned()
            .collect()
    }

    /// Get entries sharing a correlation id
    pub fn correlated_entries(&self, correlation_id: &str) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Get the total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Recompute holdings and report both conservation identities
    pub fn audit(&self) -> Result<SupplyAudit> {
        let mut circulating = TokenAmount::zero();
        for balance in self.balances.values() {
            circulating = circulating
                .checked_add(*balance)
                .ok_or_else(|| VendorError::overflow("circulating supply overflow"))?;
        }

        Ok(SupplyAudit {
            total_supply: self.total_supply,
            circulating,
            reserve_token: self.reserve.token,
            reserve_native: self.reserve.native,
            native_deposited: self.reserve.native_deposited,
            native_paid_out: self.reserve.native_paid_out,
        })
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Validate postings against the current state without mutating anything.
    ///
    /// Postings apply in order; several postings on the same holder chain.
    /// Token credits must equal token debits, so no batch can create or
    /// destroy supply. Native postings may be one-sided: they record currency
    /// entering or leaving the reserve.
    pub fn plan(&self, postings: Vec<Posting>) -> Result<LedgerBatch> {
        self.plan_postings(postings, true)
    }

    fn plan_postings(&self, postings: Vec<Posting>, conserve_supply: bool) -> Result<LedgerBatch> {
        if postings.is_empty() {
            return Err(VendorError::invalid_amount("Batch has no postings"));
        }

        let mut working: Vec<(Holder, u128)> = Vec::with_capacity(postings.len());
        let mut native_deposited = self.reserve.native_deposited;
        let mut native_paid_out = self.reserve.native_paid_out;
        let mut lines = Vec::with_capacity(postings.len());
        let mut token_credits: u128 = 0;
        let mut token_debits: u128 = 0;

        for posting in postings {
            if posting.amount == 0 {
                return Err(VendorError::invalid_amount("Amount must be greater than zero"));
            }

            let current = working
                .iter()
                .rev()
                .find(|(holder, _)| *holder == posting.holder)
                .map(|(_, value)| *value)
                .unwrap_or_else(|| self.current_value(&posting.holder));

            let balance_after = match posting.entry_type {
                EntryType::Credit => current.checked_add(posting.amount).ok_or_else(|| {
                    VendorError::overflow(format!("{} balance overflow", posting.holder))
                })?,
                EntryType::Debit => current
                    .checked_sub(posting.amount)
                    .ok_or_else(|| shortfall(&posting.holder, current, posting.amount))?,
            };

            if posting.holder.unit() == Unit::Token {
                let total = match posting.entry_type {
                    EntryType::Credit => &mut token_credits,
                    EntryType::Debit => &mut token_debits,
                };
                *total = total
                    .checked_add(posting.amount)
                    .ok_or_else(|| VendorError::overflow("batch token total overflow"))?;
            }

            if posting.holder == Holder::NativeReserve {
                let amount = NativeAmount(posting.amount);
                match posting.entry_type {
                    EntryType::Credit => {
                        native_deposited = native_deposited
                            .checked_add(amount)
                            .ok_or_else(|| VendorError::overflow("native deposited overflow"))?;
                    }
                    EntryType::Debit => {
                        native_paid_out = native_paid_out
                            .checked_add(amount)
                            .ok_or_else(|| VendorError::overflow("native paid out overflow"))?;
                    }
                }
            }

            working.push((posting.holder.clone(), balance_after));
            lines.push(PlannedLine {
                posting,
                balance_after,
            });
        }

        if conserve_supply && token_credits != token_debits {
            return Err(VendorError::UnbalancedBatch {
                credits: token_credits,
                debits: token_debits,
            });
        }

        Ok(LedgerBatch {
            version: self.version,
            lines,
            native_deposited,
            native_paid_out,
        })
    }

    /// Write a planned batch and journal it.
    ///
    /// Rejected before any write if the ledger changed since planning.
    pub fn commit(
        &mut self,
        batch: LedgerBatch,
        reason: EntryReason,
        correlation_id: &str,
    ) -> Result<Vec<EntryId>> {
        if batch.version != self.version {
            return Err(VendorError::internal(format!(
                "stale ledger batch: planned at version {}, ledger at {}",
                batch.version, self.version
            )));
        }

        let created_at = Utc::now();
        let mut entry_ids = Vec::with_capacity(batch.lines.len());

        for line in batch.lines {
            match &line.posting.holder {
                Holder::Account(account) => {
                    self.balances
                        .insert(account.clone(), TokenAmount(line.balance_after));
                }
                Holder::TokenReserve => self.reserve.token = TokenAmount(line.balance_after),
                Holder::NativeReserve => self.reserve.native = NativeAmount(line.balance_after),
            }

            let entry = LedgerEntry {
                entry_id: EntryId::new(),
                unit: line.posting.holder.unit(),
                holder: line.posting.holder,
                entry_type: line.posting.entry_type,
                amount: line.posting.amount,
                balance_after: line.balance_after,
                reason: reason.clone(),
                correlation_id: correlation_id.to_string(),
                created_at,
            };
            entry_ids.push(entry.entry_id.clone());
            self.entries.push(entry);
        }

        self.reserve.native_deposited = batch.native_deposited;
        self.reserve.native_paid_out = batch.native_paid_out;
        self.version += 1;

        debug!(
            correlation_id,
            entries = entry_ids.len(),
            version = self.version,
            "Ledger batch committed"
        );
        Ok(entry_ids)
    }

    /// Plan and commit in one step
    pub fn apply(
        &mut self,
        postings: Vec<Posting>,
        reason: EntryReason,
        correlation_id: &str,
    ) -> Result<Vec<EntryId>> {
        let batch = self.plan(postings)?;
        self.commit(batch, reason, correlation_id)
    }

    // ========================================================================
    // Adjustments
    //
    // Each helper pairs an account posting with the opposite token reserve
    // posting, or moves native currency across the reserve boundary. None of
    // them can break supply conservation.
    // ========================================================================

    /// Move tokens from the reserve to an account, returning its new balance
    pub fn credit_token(&mut self, account: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        self.adjust(vec![
            Posting::debit_token_reserve(amount),
            Posting::credit_account(account, amount),
        ])
        .map(TokenAmount)
    }

    /// Move tokens from an account back to the reserve, returning its new balance
    pub fn debit_token(&mut self, account: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        self.adjust(vec![
            Posting::debit_account(account, amount),
            Posting::credit_token_reserve(amount),
        ])
        .map(|_| self.balance_of(account))
    }

    /// Record native currency entering the reserve, returning its new value
    pub fn credit_native(&mut self, amount: NativeAmount) -> Result<NativeAmount> {
        self.adjust(vec![Posting::credit_native_reserve(amount)])
            .map(NativeAmount)
    }

    /// Record native currency leaving the reserve, returning its new value
    pub fn debit_native(&mut self, amount: NativeAmount) -> Result<NativeAmount> {
        self.adjust(vec![Posting::debit_native_reserve(amount)])
            .map(NativeAmount)
    }

    /// Apply an adjustment batch, returning the final value of its last holder
    fn adjust(&mut self, postings: Vec<Posting>) -> Result<u128> {
        let batch = self.plan(postings)?;
        let balance_after = batch
            .lines
            .last()
            .map(|line| line.balance_after)
            .unwrap_or_default();
        let correlation_id = format!("adj_{}", Uuid::new_v4());
        self.commit(batch, EntryReason::Adjustment, &correlation_id)?;
        Ok(balance_after)
    }

    fn current_value(&self, holder: &Holder) -> u128 {
        match holder {
            Holder::Account(account) => self.balance_of(account).0,
            Holder::TokenReserve => self.reserve.token.0,
            Holder::NativeReserve => self.reserve.native.0,
        }
    }
}

fn shortfall(holder: &Holder, available: u128, required: u128) -> VendorError {
    match holder {
        Holder::Account(account) => VendorError::InsufficientBalance {
            account: account.to_string(),
            available,
            required,
        },
        Holder::TokenReserve => VendorError::InsufficientTokenReserve {
            available,
            required,
        },
        Holder::NativeReserve => VendorError::InsufficientNativeReserve {
            available,
            required,
        },
    }
}
