use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, OnceLock, Weak};

use parking_lot::Mutex;
use proptest::prelude::*;

use vendor_engine::{
    Address, NativeAmount, Payout, PayoutSink, ReserveState, TokenAmount, Vendor, VendorConfig,
    VendorError, VendorEvent,
};

fn config(owner: &Address, reserve_tokens: u128, tokens_per_native: u128) -> VendorConfig {
    VendorConfig::default()
        .with_owner(owner.clone())
        .with_total_supply(TokenAmount::new(reserve_tokens))
        .with_rate(tokens_per_native, 1)
}

#[test]
fn buy_authorize_sell_scenario() {
    let owner = Address::new();
    let vendor = Vendor::new(config(&owner, 1000, 1)).unwrap();
    let alice = Address::from("0xalice");
    let spender = vendor.address().clone();

    vendor.buy(&alice, NativeAmount::new(100)).unwrap();
    assert_eq!(vendor.balance_of(&alice), TokenAmount::new(100));
    assert_eq!(vendor.reserve_state(), ReserveState::new(100, 900));

    let previous = vendor.authorize(&alice, &spender, TokenAmount::new(50)).unwrap();
    assert_eq!(previous, TokenAmount::zero());

    let receipt = vendor.sell(&alice, TokenAmount::new(50)).unwrap();
    assert_eq!(receipt.native_amount, NativeAmount::new(50));
    assert_eq!(vendor.balance_of(&alice), TokenAmount::new(50));
    assert_eq!(vendor.reserve_state(), ReserveState::new(50, 950));
    assert_eq!(vendor.allowance_of(&alice, &spender), TokenAmount::zero());

    let audit = vendor.audit().unwrap();
    assert!(audit.is_sound());
    assert_eq!(audit.native_deposited, NativeAmount::new(100));
    assert_eq!(audit.native_paid_out, NativeAmount::new(50));
}

#[test]
fn zero_buy_changes_nothing() {
    let owner = Address::new();
    let vendor = Vendor::new(config(&owner, 1000, 1)).unwrap();
    let bob = Address::from("0xbob");

    let err = vendor.buy(&bob, NativeAmount::zero()).unwrap_err();

    assert!(matches!(err, VendorError::InvalidAmount { .. }));
    assert_eq!(vendor.balance_of(&bob), TokenAmount::zero());
    assert_eq!(vendor.reserve_state(), ReserveState::new(0, 1000));
}

#[test]
fn sell_without_authorization_changes_nothing() {
    let owner = Address::new();
    let vendor = Vendor::new(config(&owner, 1000, 1)).unwrap();
    let alice = Address::new();
    vendor.buy(&alice, NativeAmount::new(100)).unwrap();
    let entries_before = vendor.recent_entries(usize::MAX).len();

    let err = vendor.sell(&alice, TokenAmount::new(10)).unwrap_err();

    assert_eq!(err.error_code(), "ALLOWANCE_EXCEEDED");
    assert_eq!(vendor.balance_of(&alice), TokenAmount::new(100));
    assert_eq!(vendor.reserve_state(), ReserveState::new(100, 900));
    assert_eq!(vendor.recent_entries(usize::MAX).len(), entries_before);
}

#[test]
fn only_owner_withdraws() {
    let owner = Address::new();
    let vendor = Vendor::new(config(&owner, 1000, 1)).unwrap();
    let mallory = Address::new();
    vendor.buy(&mallory, NativeAmount::new(100)).unwrap();

    let err = vendor.withdraw(&mallory, NativeAmount::new(100)).unwrap_err();
    assert!(matches!(err, VendorError::Unauthorized { .. }));
    assert_eq!(vendor.reserve_state().native, NativeAmount::new(100));

    let receipt = vendor.withdraw(&owner, NativeAmount::new(100)).unwrap();
    assert_eq!(receipt.reserve_after.native, NativeAmount::zero());
}

#[test]
fn concurrent_buys_cannot_oversell_reserve() {
    let owner = Address::new();
    let vendor = Arc::new(Vendor::new(config(&owner, 150, 1)).unwrap());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let vendor = vendor.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                let buyer = Address::new();
                barrier.wait();
                vendor.buy(&buyer, NativeAmount::new(100))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(VendorError::InsufficientTokenReserve {
            available: 50,
            required: 100
        })
    )));
    assert_eq!(vendor.reserve_state(), ReserveState::new(100, 50));
    assert!(vendor.audit().unwrap().is_sound());
}

#[test]
fn vendor_address_buy_leaves_reserve_untouched() {
    let owner = Address::new();
    let vendor = Vendor::new(config(&owner, 1000, 1)).unwrap();
    let vendor_address = vendor.address().clone();

    let err = vendor.buy(&vendor_address, NativeAmount::new(100)).unwrap_err();

    assert_eq!(err.error_code(), "RESERVED_ADDRESS");
    assert_eq!(vendor.reserve_state(), ReserveState::new(0, 1000));
    assert!(vendor.holders().is_empty());
    assert!(vendor.recent_entries(usize::MAX).iter().all(|e| e.correlation_id == "genesis"));
    assert!(vendor.recent_events(10).is_empty());
}

#[test]
fn events_follow_commit_order_across_threads() {
    let owner = Address::new();
    let vendor = Arc::new(Vendor::new(config(&owner, 10_000, 1)).unwrap());
    let threads = 8;
    let buys_per_thread = 25;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let vendor = vendor.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                let buyer = Address::new();
                barrier.wait();
                for _ in 0..buys_per_thread {
                    vendor.buy(&buyer, NativeAmount::new(1)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // History is newest first; every event must show a smaller reserve than
    // the one published before it
    let reserves: Vec<u128> = vendor
        .recent_events(usize::MAX)
        .into_iter()
        .rev()
        .map(|event| match event {
            VendorEvent::TokensBought { reserve, .. } => reserve.token.0,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();

    assert_eq!(reserves.len(), threads * buys_per_thread);
    assert!(reserves.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(reserves.last().copied(), Some(10_000 - 200));
}

/// Sink that calls back into the vendor during its first payout
struct ReentrantSink {
    vendor: OnceLock<Weak<Vendor>>,
    owner: Address,
    entered: AtomicBool,
    observed: Mutex<Vec<(NativeAmount, Result<(), VendorError>)>>,
}

impl PayoutSink for ReentrantSink {
    fn pay(&self, payout: &Payout) {
        if self.entered.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(vendor) = self.vendor.get().and_then(Weak::upgrade) else {
            return;
        };
        let reserve = vendor.reserve_state().native;
        let again = vendor.withdraw(&self.owner, payout.amount).map(|_| ());
        self.observed.lock().push((reserve, again));
    }
}

#[test]
fn reentrant_payout_sees_settled_reserve() {
    let owner = Address::new();
    let sink = Arc::new(ReentrantSink {
        vendor: OnceLock::new(),
        owner: owner.clone(),
        entered: AtomicBool::new(false),
        observed: Mutex::new(Vec::new()),
    });
    let vendor = Arc::new(
        Vendor::with_payout_sink(config(&owner, 1000, 1), sink.clone()).unwrap(),
    );
    sink.vendor.set(Arc::downgrade(&vendor)).unwrap();

    vendor.buy(&Address::new(), NativeAmount::new(100)).unwrap();
    vendor.withdraw(&owner, NativeAmount::new(100)).unwrap();

    let observed = sink.observed.lock();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].0, NativeAmount::zero());
    assert!(matches!(
        observed[0].1,
        Err(VendorError::InsufficientNativeReserve { available: 0, .. })
    ));
    assert_eq!(vendor.reserve_state().native, NativeAmount::zero());
    assert!(vendor.audit().unwrap().is_sound());
}

#[derive(Debug, Clone)]
enum Op {
    Buy(usize, u128),
    Authorize(usize, u128),
    Sell(usize, u128),
    Withdraw(u128),
    Transfer(usize, usize, u128),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..400u128).prop_map(|(u, a)| Op::Buy(u, a)),
        (0..3usize, 0..400u128).prop_map(|(u, a)| Op::Authorize(u, a)),
        (0..3usize, 0..400u128).prop_map(|(u, a)| Op::Sell(u, a)),
        (0..400u128).prop_map(Op::Withdraw),
        (0..3usize, 0..3usize, 0..400u128).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
    ]
}

proptest! {
    #[test]
    fn random_operations_keep_books_sound(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let owner = Address::new();
        let vendor = Vendor::new(config(&owner, 1000, 2)).unwrap();
        let users: Vec<Address> = (0..3).map(|_| Address::new()).collect();
        let spender = vendor.address().clone();

        let snapshot = |vendor: &Vendor| {
            let balances: Vec<_> = users.iter().map(|u| vendor.balance_of(u)).collect();
            let allowances: Vec<_> = users.iter().map(|u| vendor.allowance_of(u, &spender)).collect();
            (balances, allowances, vendor.reserve_state())
        };

        for op in ops {
            let before = snapshot(&vendor);
            let result = match op {
                Op::Buy(u, a) => vendor.buy(&users[u], NativeAmount::new(a)).map(|_| ()),
                Op::Authorize(u, a) => vendor
                    .authorize(&users[u], &spender, TokenAmount::new(a))
                    .map(|_| ()),
                Op::Sell(u, a) => vendor.sell(&users[u], TokenAmount::new(a)).map(|_| ()),
                Op::Withdraw(a) => vendor.withdraw(&owner, NativeAmount::new(a)).map(|_| ()),
                Op::Transfer(f, t, a) => vendor
                    .transfer(&users[f], &users[t], TokenAmount::new(a))
                    .map(|_| ()),
            };

            if result.is_err() {
                prop_assert_eq!(snapshot(&vendor), before);
            }
            prop_assert!(vendor.audit().unwrap().is_sound());
        }
    }
}
