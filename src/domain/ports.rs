use super::account::{Amount, SellerAccount};
use super::otp::OtpChallenge;
use super::query::{RequestPage, RequestQuery};
use super::session::UserId;
use super::wallet::{PhoneNumber, Wallet, WalletId, WalletName};
use super::withdrawal::{Settlement, WithdrawalId, WithdrawalRequest};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Seller balances. Every mutation is applied atomically per user.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<SellerAccount>>;
    async fn get_all(&self) -> Result<Vec<SellerAccount>>;
    async fn credit(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount>;
    /// Fails with `InsufficientBalance` without touching the account.
    async fn reserve(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount>;
    async fn release(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount>;
    async fn finalize(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Wallets of `user_id` in creation order.
    async fn list(&self, user_id: UserId) -> Result<Vec<Wallet>>;
    async fn find(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: &PhoneNumber,
    ) -> Result<Option<Wallet>>;
    /// Assigns an id and stores the wallet unless the user already holds the same
    /// `(wallet_name, phone)` pair, in which case it fails with `DuplicateWallet`.
    async fn insert(
        &self,
        user_id: UserId,
        wallet_name: WalletName,
        phone: PhoneNumber,
        created_at: DateTime<Utc>,
    ) -> Result<Wallet>;
    /// Returns whether a wallet of `user_id` was removed.
    async fn remove(&self, user_id: UserId, wallet_id: WalletId) -> Result<bool>;
}

/// Outcome of inserting a withdrawal request.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    Inserted(WithdrawalRequest),
    /// A request with the same user and idempotency key already exists.
    Duplicate(WithdrawalRequest),
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    async fn next_id(&self) -> Result<WithdrawalId>;
    async fn insert(&self, request: WithdrawalRequest) -> Result<Insertion>;
    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>>;
    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<WithdrawalRequest>>;
    /// Compare-and-swap out of `pending`: applies `settlement` only if the stored
    /// request is still pending, as one atomic step.
    async fn settle(
        &self,
        id: WithdrawalId,
        settlement: &Settlement,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest>;
    async fn query(&self, query: &RequestQuery) -> Result<RequestPage>;
}

/// Phone verification state backing wallet registration.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn is_verified(&self, phone: &PhoneNumber) -> Result<bool>;
    /// Replaces any outstanding challenge for the same phone.
    async fn issue(&self, challenge: OtpChallenge) -> Result<()>;
    /// Checks and consumes the outstanding challenge; marks the phone verified on
    /// success.
    async fn verify(&self, phone: &PhoneNumber, code: &str, now: DateTime<Utc>) -> Result<()>;
}

/// Outbound SMS delivery of one-time codes.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_otp(&self, phone: &PhoneNumber, code: &str) -> Result<()>;
}

pub trait OtpGenerator: Send + Sync {
    fn generate(&self, digits: usize) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type WithdrawalStoreRef = Arc<dyn WithdrawalStore>;
pub type OtpStoreRef = Arc<dyn OtpStore>;
pub type SmsGatewayRef = Arc<dyn SmsGateway>;
pub type OtpGeneratorRef = Arc<dyn OtpGenerator>;
pub type ClockRef = Arc<dyn Clock>;
