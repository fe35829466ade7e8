#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use reseller_payouts::application::withdrawal::{WithdrawalDraft, WithdrawalLifecycle};
use reseller_payouts::config::Config;
use reseller_payouts::domain::account::Amount;
use reseller_payouts::domain::ports::{WalletStore, WithdrawalStoreRef};
use reseller_payouts::domain::session::{Session, UserId};
use reseller_payouts::domain::wallet::{PhoneNumber, WalletName};
use reseller_payouts::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryWalletStore, InMemoryWithdrawalStore,
};
use reseller_payouts::infrastructure::system::FixedClock;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const WALLET_PHONE: &str = "01811111111";

pub struct Desk {
    pub lifecycle: Arc<WithdrawalLifecycle>,
    pub clock: FixedClock,
    pub seller: Session,
    pub admin: Session,
}

/// A lifecycle over in-memory stores with one seller holding `balance` and a
/// registered bKash wallet.
pub async fn desk(balance: Decimal) -> Desk {
    desk_over(balance, Arc::new(InMemoryWithdrawalStore::new())).await
}

/// Same as [`desk`], with requests kept in `withdrawals`.
pub async fn desk_over(balance: Decimal, withdrawals: WithdrawalStoreRef) -> Desk {
    let start = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
    let clock = FixedClock::new(start);
    let wallets = Arc::new(InMemoryWalletStore::new());
    wallets
        .insert(
            UserId(1),
            WalletName::BKash,
            PhoneNumber::parse(WALLET_PHONE).unwrap(),
            start,
        )
        .await
        .unwrap();

    let lifecycle = Arc::new(WithdrawalLifecycle::new(
        Arc::new(InMemoryAccountStore::new()),
        wallets,
        withdrawals,
        Arc::new(clock.clone()),
        &Config::default(),
    ));
    lifecycle
        .accrue_profit(UserId(1), Amount::new(balance).unwrap())
        .await
        .unwrap();

    let expires = start + Duration::days(1);
    Desk {
        lifecycle,
        clock,
        seller: Session::seller(UserId(1), "Rahim", "01700000001", expires),
        admin: Session::admin(UserId(100), "ops", expires),
    }
}

pub fn draft(amount: Decimal) -> WithdrawalDraft {
    WithdrawalDraft {
        amount,
        wallet_name: WalletName::BKash,
        wallet_phone_no: WALLET_PHONE.to_string(),
        idempotency_key: None,
    }
}

/// Writes `rows` credit rows spread over ten sellers, then one withdrawal per seller.
pub fn generate_operations_csv(path: &std::path::Path, rows: usize) -> Result<(), std::io::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["op", "user", "request", "amount", "wallet", "phone", "reference", "remarks"])?;

    for i in 0..rows {
        let user = (i % 10 + 1).to_string();
        wtr.write_record(["credit", &user, "", "10.25", "", "", "", ""])?;
    }
    for user in 1..=10 {
        let phone = format!("018000000{user:02}");
        let user = user.to_string();
        wtr.write_record(["send_otp", &user, "", "", "", &phone, "", ""])?;
        wtr.write_record(["verify_otp", &user, "", "", "", &phone, "", ""])?;
        wtr.write_record(["add_wallet", &user, "", "", "Nagad", &phone, "", ""])?;
        wtr.write_record(["withdraw", &user, "", "100", "Nagad", &phone, "", ""])?;
    }
    wtr.flush()?;
    Ok(())
}
