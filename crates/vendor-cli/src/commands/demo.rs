//! In-memory walkthrough of the vendor lifecycle

use colored::*;
use tokio::sync::broadcast::error::TryRecvError;
use vendor_engine::{
    Address, NativeAmount, Receipt, TokenAmount, Vendor, VendorConfig, VendorError,
};

use crate::display;

/// Buy, approve, sell back, withdraw, plus the rejections in between
pub async fn run_demo(reserve: u128, rate: u128, json: bool) -> anyhow::Result<()> {
    let owner = Address::from("0xowner");
    let alice = Address::from("0xalice");
    let bob = Address::from("0xbob");

    let config = VendorConfig::default()
        .with_owner(owner.clone())
        .with_vendor_address(Address::from("0xvendor"))
        .with_total_supply(TokenAmount::new(reserve))
        .with_rate(rate, 1);
    let vendor = Vendor::new(config)?;
    let mut events = vendor.subscribe();
    let token = vendor.token_metadata().clone();
    let spender = vendor.address().clone();

    display::section("Step 1: Genesis");
    display::labeled("Rate", &vendor.pricing().to_string());
    display::reserve(&token, &vendor.reserve_state());

    display::section("Step 2: Alice buys with 100 native");
    report("buy", vendor.buy(&alice, NativeAmount::new(100)));
    display::tokens("Alice", &token, vendor.balance_of(&alice));

    display::section("Step 3: Rejections leave state untouched");
    report("bob buys with 0", vendor.buy(&bob, NativeAmount::zero()));
    report(
        "alice sells without approval",
        vendor.sell(&alice, TokenAmount::new(50)),
    );
    report(
        "bob withdraws",
        vendor.withdraw(&bob, NativeAmount::new(1)),
    );
    display::reserve(&token, &vendor.reserve_state());

    display::section("Step 4: Alice approves the vendor and sells 50 back");
    let half = TokenAmount::new(vendor.balance_of(&alice).0 / 2);
    vendor.authorize(&alice, &spender, half)?;
    display::tokens("Allowance", &token, vendor.allowance_of(&alice, &spender));
    report("sell", vendor.sell(&alice, half));
    display::tokens("Alice", &token, vendor.balance_of(&alice));
    display::tokens("Allowance", &token, vendor.allowance_of(&alice, &spender));

    display::section("Step 5: Owner withdraws the proceeds");
    report("withdraw all", vendor.withdraw_all(&owner));
    display::reserve(&token, &vendor.reserve_state());

    display::section("Audit");
    let audit = vendor.audit()?;
    display::tokens("Circulating", &token, audit.circulating);
    display::native("Deposited", audit.native_deposited);
    display::native("Paid out", audit.native_paid_out);
    if audit.is_sound() {
        display::success("Supply conserved and native reserve balanced");
    } else {
        anyhow::bail!("ledger audit failed: {:?}", audit);
    }

    display::section("Event Stream");
    loop {
        match events.try_recv() {
            Ok(event) => {
                if json {
                    println!("  {}", serde_json::to_string(&event)?);
                } else {
                    println!(
                        "  {} {}",
                        event.timestamp().format("%H:%M:%S%.3f").to_string().bright_black(),
                        event.event_type().bright_cyan()
                    );
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                display::info(&format!("{} events skipped", skipped));
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    println!();
    Ok(())
}

fn report(label: &str, result: Result<Receipt, VendorError>) {
    match result {
        Ok(receipt) => display::success(&format!(
            "{} settled: {} for {} ({})",
            label, receipt.native_amount, receipt.token_amount, receipt.receipt_id
        )),
        Err(err) => display::rejected(label, &err),
    }
}
