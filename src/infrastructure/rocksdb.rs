use crate::domain::account::{Amount, SellerAccount};
use crate::domain::ports::{AccountStore, Insertion, WalletStore, WithdrawalStore};
use crate::domain::query::{RequestPage, RequestQuery};
use crate::domain::session::UserId;
use crate::domain::wallet::{PhoneNumber, Wallet, WalletId, WalletName};
use crate::domain::withdrawal::{Settlement, WithdrawalId, WithdrawalRequest};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing seller ledgers.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing registered wallets.
pub const CF_WALLETS: &str = "wallets";
/// Column Family for storing withdrawal requests.
pub const CF_WITHDRAWALS: &str = "withdrawals";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const LAST_WALLET_ID: &[u8] = b"last_wallet_id";
const LAST_WITHDRAWAL_ID: &[u8] = b"last_withdrawal_id";

/// A persistent store implementation using RocksDB.
///
/// Stores accounts, wallets and withdrawal requests in separate Column Families
/// as JSON documents keyed by their big-endian id. Read-modify-write sequences
/// are serialized by a process-wide mutex so balance and status updates stay
/// atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_WALLETS, CF_WITHDRAWALS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PayoutError::InternalError(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn next_sequence(&self, key: &[u8]) -> Result<u64> {
        let last: u64 = self.get_json(CF_META, key)?.unwrap_or(0);
        let next = last + 1;
        self.put_json(CF_META, key, &next)?;
        Ok(next)
    }

    async fn update_account<F>(&self, user_id: UserId, op: F) -> Result<SellerAccount>
    where
        F: FnOnce(&mut SellerAccount) -> Result<()> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let key = user_id.0.to_be_bytes();
        let mut account = self
            .get_json(CF_ACCOUNTS, &key)?
            .unwrap_or_else(|| SellerAccount::new(user_id));
        op(&mut account)?;
        self.put_json(CF_ACCOUNTS, &key, &account)?;
        Ok(account)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn get(&self, user_id: UserId) -> Result<Option<SellerAccount>> {
        self.get_json(CF_ACCOUNTS, &user_id.0.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<SellerAccount>> {
        self.scan(CF_ACCOUNTS)
    }

    async fn credit(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update_account(user_id, |account| {
            account.credit(amount);
            Ok(())
        })
        .await
    }

    async fn reserve(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update_account(user_id, |account| account.reserve(amount))
            .await
    }

    async fn release(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update_account(user_id, |account| account.release(amount))
            .await
    }

    async fn finalize(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        self.update_account(user_id, |account| account.finalize(amount))
            .await
    }
}

#[async_trait]
impl WalletStore for RocksDBStore {
    async fn list(&self, user_id: UserId) -> Result<Vec<Wallet>> {
        let wallets: Vec<Wallet> = self.scan(CF_WALLETS)?;
        Ok(wallets
            .into_iter()
            .filter(|wallet| wallet.user_id == user_id)
            .collect())
    }

    async fn find(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: &PhoneNumber,
    ) -> Result<Option<Wallet>> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .find(|wallet| wallet.matches(wallet_name, phone)))
    }

    async fn insert(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: PhoneNumber,
        created_at: DateTime<Utc>,
    ) -> Result<Wallet> {
        let _guard = self.write_lock.lock().await;
        if self.find(user_id, wallet_name, &phone).await?.is_some() {
            return Err(PayoutError::DuplicateWallet);
        }

        let wallet = Wallet {
            wallet_id: WalletId(self.next_sequence(LAST_WALLET_ID)?),
            user_id,
            wallet_name,
            wallet_phone_no: phone,
            created_at,
        };
        self.put_json(CF_WALLETS, &wallet.wallet_id.0.to_be_bytes(), &wallet)?;
        Ok(wallet)
    }

    async fn remove(&self, user_id: UserId, wallet_id: WalletId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = wallet_id.0.to_be_bytes();
        match self.get_json::<Wallet>(CF_WALLETS, &key)? {
            Some(wallet) if wallet.user_id == user_id => {
                self.db.delete_cf(self.cf(CF_WALLETS)?, key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl WithdrawalStore for RocksDBStore {
    async fn next_id(&self) -> Result<WithdrawalId> {
        let _guard = self.write_lock.lock().await;
        Ok(WithdrawalId(self.next_sequence(LAST_WITHDRAWAL_ID)?))
    }

    async fn insert(&self, request: WithdrawalRequest) -> Result<Insertion> {
        let _guard = self.write_lock.lock().await;
        if let Some(key) = request.idempotency_key.as_deref()
            && let Some(existing) = self.find_by_idempotency_key(request.user_id, key).await?
        {
            return Ok(Insertion::Duplicate(existing));
        }

        self.put_json(CF_WITHDRAWALS, &request.withdraw_id.0.to_be_bytes(), &request)?;
        Ok(Insertion::Inserted(request))
    }

    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        self.get_json(CF_WITHDRAWALS, &id.0.to_be_bytes())
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<WithdrawalRequest>> {
        let requests: Vec<WithdrawalRequest> = self.scan(CF_WITHDRAWALS)?;
        Ok(requests
            .into_iter()
            .find(|r| r.user_id == user_id && r.idempotency_key.as_deref() == Some(key)))
    }

    async fn settle(
        &self,
        id: WithdrawalId,
        settlement: &Settlement,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest> {
        let _guard = self.write_lock.lock().await;
        let key = id.0.to_be_bytes();
        let mut request: WithdrawalRequest = self
            .get_json(CF_WITHDRAWALS, &key)?
            .ok_or(PayoutError::NotFound(id))?;
        request.settle(settlement, now)?;
        self.put_json(CF_WITHDRAWALS, &key, &request)?;
        Ok(request)
    }

    async fn query(&self, query: &RequestQuery) -> Result<RequestPage> {
        let requests: Vec<WithdrawalRequest> = self.scan(CF_WITHDRAWALS)?;
        Ok(query.paginate(requests))
    }
}
