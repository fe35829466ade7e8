use crate::domain::account::{Amount, SellerAccount};
use crate::domain::otp::OtpChallenge;
use crate::domain::ports::{AccountStore, Insertion, OtpStore, WalletStore, WithdrawalStore};
use crate::domain::query::{RequestPage, RequestQuery};
use crate::domain::session::UserId;
use crate::domain::wallet::{PhoneNumber, Wallet, WalletId, WalletName};
use crate::domain::withdrawal::{Settlement, WithdrawalId, WithdrawalRequest};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory ledger of seller accounts.
///
/// Each mutation runs under the write lock on a copy of the account and is only
/// committed when the domain operation succeeds.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<UserId, SellerAccount>>>,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, user_id: UserId, op: F) -> Result<SellerAccount>
    where
        F: FnOnce(&mut SellerAccount) -> Result<()> + Send,
    {
        let mut accounts = self.accounts.write().await;
        let mut account = accounts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| SellerAccount::new(user_id));
        op(&mut account)?;
        accounts.insert(user_id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, user_id: UserId) -> Result<Option<SellerAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&user_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<SellerAccount>> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<SellerAccount> = accounts.values().cloned().collect();
        all.sort_by_key(|account| account.user_id);
        Ok(all)
    }

    async fn credit(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update(user_id, |account| {
            account.credit(amount);
            Ok(())
        })
        .await
    }

    async fn reserve(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update(user_id, |account| account.reserve(amount)).await
    }

    async fn release(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update(user_id, |account| account.release(amount)).await
    }

    async fn finalize(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update(user_id, |account| account.finalize(amount)).await
    }
}

#[derive(Default)]
struct WalletTable {
    last_id: u64,
    wallets: BTreeMap<WalletId, Wallet>,
}

/// A thread-safe in-memory wallet registry.
///
/// Wallet ids are assigned sequentially, so iterating the `BTreeMap` yields
/// creation order.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    table: Arc<RwLock<WalletTable>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn list(&self, user_id: UserId) -> Result<Vec<Wallet>> {
        let table = self.table.read().await;
        Ok(table
            .wallets
            .values()
            .filter(|wallet| wallet.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: &PhoneNumber,
    ) -> Result<Option<Wallet>> {
        let table = self.table.read().await;
        Ok(table
            .wallets
            .values()
            .find(|wallet| wallet.user_id == user_id && wallet.matches(wallet_name, phone))
            .cloned())
    }

    async fn insert(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: PhoneNumber,
        created_at: DateTime<Utc>,
    ) -> Result<Wallet> {
        let mut table = self.table.write().await;
        let duplicate = table
            .wallets
            .values()
            .any(|wallet| wallet.user_id == user_id && wallet.matches(wallet_name, &phone));
        if duplicate {
            return Err(PayoutError::DuplicateWallet);
        }

        table.last_id += 1;
        let wallet = Wallet {
            wallet_id: WalletId(table.last_id),
            user_id,
            wallet_name,
            wallet_phone_no: phone,
            created_at,
        };
        table.wallets.insert(wallet.wallet_id, wallet.clone());
        Ok(wallet)
    }

    async fn remove(&self, user_id: UserId, wallet_id: WalletId) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.wallets.get(&wallet_id) {
            Some(wallet) if wallet.user_id == user_id => {
                table.wallets.remove(&wallet_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// A thread-safe in-memory store for withdrawal requests.
#[derive(Default, Clone)]
pub struct InMemoryWithdrawalStore {
    requests: Arc<RwLock<HashMap<WithdrawalId, WithdrawalRequest>>>,
    last_id: Arc<AtomicU64>,
}

impl InMemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryWithdrawalStore {
    async fn next_id(&self) -> Result<WithdrawalId> {
        Ok(WithdrawalId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn insert(&self, request: WithdrawalRequest) -> Result<Insertion> {
        let mut requests = self.requests.write().await;
        if let Some(key) = request.idempotency_key.as_deref()
            && let Some(existing) = requests
                .values()
                .find(|r| r.user_id == request.user_id && r.idempotency_key.as_deref() == Some(key))
        {
            return Ok(Insertion::Duplicate(existing.clone()));
        }
        requests.insert(request.withdraw_id, request.clone());
        Ok(Insertion::Inserted(request))
    }

    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<WithdrawalRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .find(|r| r.user_id == user_id && r.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn settle(
        &self,
        id: WithdrawalId,
        settlement: &Settlement,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest> {
        let mut requests = self.requests.write().await;
        let request = requests.get_mut(&id).ok_or(PayoutError::NotFound(id))?;
        request.settle(settlement, now)?;
        Ok(request.clone())
    }

    async fn query(&self, query: &RequestQuery) -> Result<RequestPage> {
        let requests = self.requests.read().await;
        Ok(query.paginate(requests.values().cloned()))
    }
}

/// In-memory phone verification state.
#[derive(Default, Clone)]
pub struct InMemoryOtpStore {
    challenges: Arc<RwLock<HashMap<PhoneNumber, OtpChallenge>>>,
    verified: Arc<RwLock<HashSet<PhoneNumber>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn is_verified(&self, phone: &PhoneNumber) -> Result<bool> {
        let verified = self.verified.read().await;
        Ok(verified.contains(phone))
    }

    async fn issue(&self, challenge: OtpChallenge) -> Result<()> {
        let mut challenges = self.challenges.write().await;
        challenges.insert(challenge.phone.clone(), challenge);
        Ok(())
    }

    async fn verify(&self, phone: &PhoneNumber, code: &str, now: DateTime<Utc>) -> Result<()> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges.get_mut(phone).ok_or(PayoutError::InvalidOtp)?;
        challenge.verify(code, now)?;
        self.verified.write().await.insert(phone.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::domain::fee::FeeQuote;
    use crate::domain::session::Session;
    use crate::domain::withdrawal::WithdrawalStatus;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
    }

    fn phone(raw: &str) -> PhoneNumber {
        PhoneNumber::parse(raw).unwrap()
    }

    fn pending(id: WithdrawalId, key: Option<&str>) -> WithdrawalRequest {
        let session = Session::seller(UserId(1), "Rahim", "01700000001", now() + Duration::hours(1));
        let wallet = Wallet {
            wallet_id: WalletId(1),
            user_id: UserId(1),
            wallet_name: WalletName::BKash,
            wallet_phone_no: phone("01811111111"),
            created_at: now(),
        };
        WithdrawalRequest::pending(
            id,
            &session,
            &wallet,
            Amount::new(dec!(100)).unwrap(),
            FeeQuote {
                transaction_fee: dec!(5),
                actual_amount: dec!(95),
            },
            now(),
            key.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_in_memory_account_store() {
        let store = InMemoryAccountStore::new();
        store
            .credit(UserId(1), Amount::new(dec!(100.0)).unwrap())
            .await
            .unwrap();

        let retrieved = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(retrieved.available, Balance::new(dec!(100.0)));
        assert!(store.get(UserId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_reserve_leaves_account_untouched() {
        let store = InMemoryAccountStore::new();
        store
            .credit(UserId(1), Amount::new(dec!(10)).unwrap())
            .await
            .unwrap();

        let result = store.reserve(UserId(1), Amount::new(dec!(11)).unwrap()).await;
        assert!(matches!(result, Err(PayoutError::InsufficientBalance { .. })));

        let account = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(account.available, Balance::new(dec!(10)));
        assert_eq!(account.reserved, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_wallet_store_rejects_duplicates_per_user() {
        let store = InMemoryWalletStore::new();
        let first = store
            .insert(UserId(1), WalletName::BKash, phone("01711111111"), now())
            .await
            .unwrap();
        assert_eq!(first.wallet_id, WalletId(1));

        let duplicate = store
            .insert(UserId(1), WalletName::BKash, phone("01711111111"), now())
            .await;
        assert!(matches!(duplicate, Err(PayoutError::DuplicateWallet)));

        store
            .insert(UserId(1), WalletName::Nagad, phone("01711111111"), now())
            .await
            .unwrap();
        store
            .insert(UserId(2), WalletName::BKash, phone("01711111111"), now())
            .await
            .unwrap();

        let wallets = store.list(UserId(1)).await.unwrap();
        let names: Vec<WalletName> = wallets.iter().map(|w| w.wallet_name).collect();
        assert_eq!(names, vec![WalletName::BKash, WalletName::Nagad]);
    }

    #[tokio::test]
    async fn test_wallet_removal_is_owner_scoped() {
        let store = InMemoryWalletStore::new();
        let wallet = store
            .insert(UserId(1), WalletName::BKash, phone("01711111111"), now())
            .await
            .unwrap();

        assert!(!store.remove(UserId(2), wallet.wallet_id).await.unwrap());
        assert!(store.remove(UserId(1), wallet.wallet_id).await.unwrap());
        assert!(store.list(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_store_settles_once() {
        let store = InMemoryWithdrawalStore::new();
        let id = store.next_id().await.unwrap();
        store.insert(pending(id, None)).await.unwrap();

        let settled = store
            .settle(id, &Settlement::Cancel, now())
            .await
            .unwrap();
        assert_eq!(settled.status, WithdrawalStatus::Cancelled);

        let again = store
            .settle(id, &Settlement::reject("late").unwrap(), now())
            .await;
        assert!(matches!(again, Err(PayoutError::NotPending { .. })));
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            WithdrawalStatus::Cancelled
        );

        let missing = store.settle(WithdrawalId(99), &Settlement::Cancel, now()).await;
        assert!(matches!(missing, Err(PayoutError::NotFound(WithdrawalId(99)))));
    }

    #[tokio::test]
    async fn test_withdrawal_store_idempotency_key() {
        let store = InMemoryWithdrawalStore::new();
        let first = store.next_id().await.unwrap();
        let second = store.next_id().await.unwrap();
        assert_ne!(first, second);

        assert!(matches!(
            store.insert(pending(first, Some("k1"))).await.unwrap(),
            Insertion::Inserted(_)
        ));
        match store.insert(pending(second, Some("k1"))).await.unwrap() {
            Insertion::Duplicate(existing) => assert_eq!(existing.withdraw_id, first),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert!(store.get(second).await.unwrap().is_none());
        assert!(
            store
                .find_by_idempotency_key(UserId(1), "k1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_otp_store_marks_phone_verified() {
        let store = InMemoryOtpStore::new();
        let number = phone("01711111111");
        assert!(!store.is_verified(&number).await.unwrap());
        assert!(matches!(
            store.verify(&number, "123456", now()).await,
            Err(PayoutError::InvalidOtp)
        ));

        store
            .issue(OtpChallenge::new(
                number.clone(),
                "123456".to_string(),
                now(),
                Duration::seconds(120),
                5,
            ))
            .await
            .unwrap();
        store.verify(&number, "123456", now()).await.unwrap();
        assert!(store.is_verified(&number).await.unwrap());
    }
}
