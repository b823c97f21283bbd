//! Native currency payouts
//!
//! A payout is handed to the sink only after the ledger has committed the
//! debit and the vendor's state lock has been released. A sink that calls
//! back into the vendor therefore sees the post-payout reserve.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendor_core::{Address, NativeAmount};

/// Why native currency left the reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutReason {
    /// Proceeds of a sell, paid to the seller
    SellProceeds,
    /// Owner withdrawal
    Withdrawal,
}

/// A committed transfer of native currency out of the reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub payout_id: String,
    pub recipient: Address,
    pub amount: NativeAmount,
    pub reason: PayoutReason,
    /// Receipt id of the operation that owes this payout
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    pub fn new(
        recipient: Address,
        amount: NativeAmount,
        reason: PayoutReason,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            payout_id: format!("payout_{}", Uuid::new_v4()),
            recipient,
            amount,
            reason,
            correlation_id: correlation_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Payouts an in-memory sink keeps when no limit is given
pub const DEFAULT_PAYOUT_HISTORY: usize = 1000;

/// Destination for committed payouts.
///
/// The ledger side is already final when `pay` runs, so delivery cannot
/// fail the operation; a sink that needs retries keeps its own queue.
pub trait PayoutSink: Send + Sync {
    fn pay(&self, payout: &Payout);

    /// Most recent deliveries, newest first. Sinks that keep no history
    /// return nothing.
    fn recent(&self, _limit: usize) -> Vec<Payout> {
        Vec::new()
    }
}

/// Records payouts in memory, keeping the last `limit` of them
pub struct InMemoryPayouts {
    retained: Mutex<VecDeque<Payout>>,
    totals: Mutex<HashMap<Address, NativeAmount>>,
    delivered: Mutex<u64>,
    limit: usize,
}

impl Default for InMemoryPayouts {
    fn default() -> Self {
        Self::with_limit(DEFAULT_PAYOUT_HISTORY)
    }
}

impl InMemoryPayouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            retained: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
            totals: Mutex::new(HashMap::new()),
            delivered: Mutex::new(0),
            limit,
        }
    }

    /// Retained payouts in delivery order
    pub fn payouts(&self) -> Vec<Payout> {
        self.retained.lock().iter().cloned().collect()
    }

    /// Total native delivered to `recipient`
    pub fn total_paid_to(&self, recipient: &Address) -> NativeAmount {
        self.totals
            .lock()
            .get(recipient)
            .copied()
            .unwrap_or(NativeAmount::zero())
    }

    /// Payouts delivered since creation, including those no longer retained
    pub fn count(&self) -> u64 {
        *self.delivered.lock()
    }
}

impl PayoutSink for InMemoryPayouts {
    fn pay(&self, payout: &Payout) {
        {
            let mut totals = self.totals.lock();
            let total = totals
                .entry(payout.recipient.clone())
                .or_insert(NativeAmount::zero());
            // Bounded by the reserve that was debited, which fits in u128
            *total = total.checked_add(payout.amount).unwrap_or(NativeAmount(u128::MAX));
        }
        *self.delivered.lock() += 1;

        if self.limit > 0 {
            let mut retained = self.retained.lock();
            if retained.len() == self.limit {
                retained.pop_front();
            }
            retained.push_back(payout.clone());
        }
    }

    fn recent(&self, limit: usize) -> Vec<Payout> {
        self.retained.lock().iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_totals() {
        let sink = InMemoryPayouts::new();
        let alice = Address::new();

        sink.pay(&Payout::new(
            alice.clone(),
            NativeAmount::new(30),
            PayoutReason::SellProceeds,
            "receipt_1",
        ));
        sink.pay(&Payout::new(
            alice.clone(),
            NativeAmount::new(12),
            PayoutReason::SellProceeds,
            "receipt_2",
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.total_paid_to(&alice), NativeAmount::new(42));
        assert_eq!(sink.total_paid_to(&Address::new()), NativeAmount::zero());
        assert_eq!(sink.payouts()[1].correlation_id, "receipt_2");
        assert_eq!(sink.recent(1)[0].correlation_id, "receipt_2");
    }

    #[test]
    fn test_history_is_bounded() {
        let sink = InMemoryPayouts::with_limit(3);
        let alice = Address::new();

        for i in 0..10 {
            sink.pay(&Payout::new(
                alice.clone(),
                NativeAmount::new(1),
                PayoutReason::Withdrawal,
                format!("receipt_{}", i),
            ));
        }

        assert_eq!(sink.count(), 10);
        assert_eq!(sink.payouts().len(), 3);
        assert_eq!(sink.payouts()[0].correlation_id, "receipt_7");
        assert_eq!(sink.total_paid_to(&alice), NativeAmount::new(10));

        let recent = sink.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].correlation_id, "receipt_9");
        assert_eq!(recent[1].correlation_id, "receipt_8");
    }

    #[test]
    fn test_zero_limit_keeps_totals_only() {
        let sink = InMemoryPayouts::with_limit(0);
        let alice = Address::new();
        sink.pay(&Payout::new(
            alice.clone(),
            NativeAmount::new(5),
            PayoutReason::SellProceeds,
            "receipt_1",
        ));

        assert!(sink.payouts().is_empty());
        assert!(sink.recent(10).is_empty());
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.total_paid_to(&alice), NativeAmount::new(5));
    }
}
