//! Vendor events for UI refresh and explorer-style history
//!
//! Events are broadcast to all subscribers and kept in a bounded history.
//! They are published only after the operation that caused them has fully
//! settled, payout included.
//!
//! Each event takes a sequence number while the vendor still holds its state
//! lock, so sequence order is commit order. Publishing happens later and
//! from many threads; the bus holds early arrivals back until every lower
//! sequence has been published.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vendor_core::{Address, NativeAmount, TokenAmount};
use vendor_ledger::ReserveState;

/// Balance-changing events emitted by the vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VendorEvent {
    /// Buyer paid native currency and received tokens
    TokensBought {
        buyer: Address,
        native_amount: NativeAmount,
        token_amount: TokenAmount,
        reserve: ReserveState,
        timestamp: DateTime<Utc>,
    },

    /// Seller returned tokens and was paid native currency
    TokensSold {
        seller: Address,
        token_amount: TokenAmount,
        native_amount: NativeAmount,
        reserve: ReserveState,
        timestamp: DateTime<Utc>,
    },

    /// Owner withdrew native proceeds
    Withdrawn {
        owner: Address,
        native_amount: NativeAmount,
        reserve: ReserveState,
        timestamp: DateTime<Utc>,
    },

    /// Allowance set (absolute, replacing `previous`)
    Approval {
        owner: Address,
        spender: Address,
        amount: TokenAmount,
        previous: TokenAmount,
        timestamp: DateTime<Utc>,
    },

    /// Tokens moved between holders
    Transfer {
        from: Address,
        to: Address,
        amount: TokenAmount,
        timestamp: DateTime<Utc>,
    },

    /// Withdrawal privilege moved to a new owner
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
        timestamp: DateTime<Utc>,
    },
}

impl VendorEvent {
    /// Short name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TokensBought { .. } => "TokensBought",
            Self::TokensSold { .. } => "TokensSold",
            Self::Withdrawn { .. } => "Withdrawn",
            Self::Approval { .. } => "Approval",
            Self::Transfer { .. } => "Transfer",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TokensBought { timestamp, .. }
            | Self::TokensSold { timestamp, .. }
            | Self::Withdrawn { timestamp, .. }
            | Self::Approval { timestamp, .. }
            | Self::Transfer { timestamp, .. }
            | Self::OwnershipTransferred { timestamp, .. } => *timestamp,
        }
    }

    /// Whether `account` is a party to this event
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            Self::TokensBought { buyer, .. } => buyer == account,
            Self::TokensSold { seller, .. } => seller == account,
            Self::Withdrawn { owner, .. } => owner == account,
            Self::Approval { owner, spender, .. } => owner == account || spender == account,
            Self::Transfer { from, to, .. } => from == account || to == account,
            Self::OwnershipTransferred {
                previous_owner,
                new_owner,
                ..
            } => previous_owner == account || new_owner == account,
        }
    }
}

/// Events that arrived ahead of an unpublished lower sequence
struct Reorder {
    next: u64,
    waiting: BTreeMap<u64, VendorEvent>,
}

/// Broadcast channel plus bounded history, delivered in sequence order
pub struct EventBus {
    sender: broadcast::Sender<VendorEvent>,
    history: Mutex<VecDeque<VendorEvent>>,
    history_limit: usize,
    next_sequence: AtomicU64,
    reorder: Mutex<Reorder>,
}

impl EventBus {
    /// `capacity` must be non-zero
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_limit.min(1024))),
            history_limit,
            next_sequence: AtomicU64::new(0),
            reorder: Mutex::new(Reorder {
                next: 0,
                waiting: BTreeMap::new(),
            }),
        }
    }

    /// Claim the next position in the event order.
    ///
    /// Every claimed sequence must later be passed to `publish_at`, or later
    /// events stay held back.
    pub fn reserve_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Record and broadcast an event at the next free position
    pub fn publish(&self, event: VendorEvent) {
        let sequence = self.reserve_sequence();
        self.publish_at(sequence, event);
    }

    /// Record and broadcast an event at a previously reserved position
    pub fn publish_at(&self, sequence: u64, event: VendorEvent) {
        let mut reorder = self.reorder.lock();
        reorder.waiting.insert(sequence, event);

        loop {
            let next = reorder.next;
            let Some(event) = reorder.waiting.remove(&next) else {
                break;
            };
            reorder.next += 1;
            self.emit(event);
        }
    }

    fn emit(&self, event: VendorEvent) {
        {
            let mut history = self.history.lock();
            if self.history_limit > 0 {
                if history.len() == self.history_limit {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
        }
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VendorEvent> {
        self.sender.subscribe()
    }

    /// Most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<VendorEvent> {
        self.history.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Most recent events involving `account`, newest first
    pub fn for_account(&self, account: &Address, limit: usize) -> Vec<VendorEvent> {
        self.history
            .lock()
            .iter()
            .rev()
            .filter(|event| event.involves(account))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &Address, to: &Address, amount: u128) -> VendorEvent {
        VendorEvent::Transfer {
            from: from.clone(),
            to: to.clone(),
            amount: TokenAmount::new(amount),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new(16, 2);
        let a = Address::new();
        let b = Address::new();

        bus.publish(transfer(&a, &b, 1));
        bus.publish(transfer(&a, &b, 2));
        bus.publish(transfer(&a, &b, 3));

        let recent = bus.recent(10);
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            recent[0],
            VendorEvent::Transfer { amount, .. } if amount == TokenAmount::new(3)
        ));
    }

    #[test]
    fn test_for_account_filters() {
        let bus = EventBus::new(16, 10);
        let a = Address::new();
        let b = Address::new();
        let c = Address::new();

        bus.publish(transfer(&a, &b, 1));
        bus.publish(transfer(&b, &c, 2));

        assert_eq!(bus.for_account(&a, 10).len(), 1);
        assert_eq!(bus.for_account(&b, 10).len(), 2);
        assert_eq!(bus.for_account(&c, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(16, 10);
        let mut rx = bus.subscribe();
        let a = Address::new();

        bus.publish(VendorEvent::OwnershipTransferred {
            previous_owner: a.clone(),
            new_owner: Address::new(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "OwnershipTransferred");
        assert!(event.involves(&a));
    }

    #[test]
    fn test_out_of_order_publish_is_held_back() {
        let bus = EventBus::new(16, 10);
        let mut rx = bus.subscribe();
        let a = Address::new();
        let b = Address::new();

        let first = bus.reserve_sequence();
        let second = bus.reserve_sequence();

        bus.publish_at(second, transfer(&a, &b, 2));
        assert!(bus.recent(10).is_empty());
        assert!(rx.try_recv().is_err());

        bus.publish_at(first, transfer(&a, &b, 1));
        let amounts: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                VendorEvent::Transfer { amount, .. } => amount.0,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(amounts, vec![1, 2]);
        assert_eq!(bus.recent(10).len(), 2);

        // Unsequenced publishes queue behind the reserved ones
        bus.publish(transfer(&a, &b, 3));
        assert!(matches!(
            bus.recent(1)[0],
            VendorEvent::Transfer { amount, .. } if amount == TokenAmount::new(3)
        ));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = transfer(&Address::from("0xa"), &Address::from("0xb"), 5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Transfer");
        assert_eq!(json["from"], "0xa");
        assert_eq!(json["amount"], 5);
    }
}
