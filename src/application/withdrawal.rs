use crate::config::Config;
use crate::domain::account::{Amount, Balance, SellerAccount};
use crate::domain::fee::{FeeQuote, FeeSchedule};
use crate::domain::ports::{
    AccountStoreRef, ClockRef, Insertion, WalletStoreRef, WithdrawalStoreRef,
};
use crate::domain::query::{RequestPage, RequestQuery};
use crate::domain::session::{Session, UserId};
use crate::domain::wallet::{PhoneNumber, WalletName};
use crate::domain::withdrawal::{Settlement, WithdrawalId, WithdrawalRequest, WithdrawalStatus};
use crate::error::{PayoutError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What a seller submits to request a withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDraft {
    pub amount: Decimal,
    pub wallet_name: WalletName,
    pub wallet_phone_no: String,
    /// Repeating a key returns the request created by its first use.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWithdrawal {
    pub request: WithdrawalRequest,
    pub new_balance: Balance,
}

/// Gates creations that share an idempotency key.
///
/// A retry waits for the attempt that holds the gate and then replays its
/// request instead of reserving a second time.
#[derive(Default)]
struct KeyGates {
    held: Mutex<HashMap<(UserId, String), Arc<Mutex<()>>>>,
}

impl KeyGates {
    async fn gate(&self, user_id: UserId, key: &str) -> Arc<Mutex<()>> {
        let mut held = self.held.lock().await;
        held.entry((user_id, key.to_string())).or_default().clone()
    }

    /// Drops the gate once no other creation is waiting on it.
    async fn forget(&self, user_id: UserId, key: &str, gate: Arc<Mutex<()>>) {
        let mut held = self.held.lock().await;
        // Only the map and `gate` itself still point at it.
        if Arc::strong_count(&gate) == 2 {
            held.remove(&(user_id, key.to_string()));
        }
    }
}

/// The withdrawal state machine.
///
/// A request is created `pending`, reserving its amount from the seller's
/// available balance, and leaves `pending` exactly once: `completed` keeps the
/// debit, `rejected` and `cancelled` return the reservation. The stores are the
/// serialization point; this service never trusts a balance or status it did
/// not just read from them.
pub struct WithdrawalLifecycle {
    accounts: AccountStoreRef,
    wallets: WalletStoreRef,
    withdrawals: WithdrawalStoreRef,
    clock: ClockRef,
    fees: FeeSchedule,
    page_sizes: Vec<u32>,
    key_gates: KeyGates,
}

impl WithdrawalLifecycle {
    pub fn new(
        accounts: AccountStoreRef,
        wallets: WalletStoreRef,
        withdrawals: WithdrawalStoreRef,
        clock: ClockRef,
        config: &Config,
    ) -> Self {
        Self {
            accounts,
            wallets,
            withdrawals,
            clock,
            fees: config.fee_schedule(),
            page_sizes: config.page_sizes.clone(),
            key_gates: KeyGates::default(),
        }
    }

    /// Fee preview for the withdrawal form; no state is touched.
    pub fn quote(&self, wallet_name: WalletName, amount: Decimal) -> Result<FeeQuote> {
        self.fees.compute_fee(wallet_name, amount)
    }

    /// The seller's ledger as currently stored.
    pub async fn balance(&self, session: &Session) -> Result<SellerAccount> {
        session.authenticate(self.clock.now())?;
        Ok(self
            .accounts
            .get(session.user_id)
            .await?
            .unwrap_or_else(|| SellerAccount::new(session.user_id)))
    }

    /// Accrues resale profit into a seller's available balance.
    pub async fn accrue_profit(&self, user_id: UserId, amount: Amount) -> Result<SellerAccount> {
        let account = self.accounts.credit(user_id, amount).await?;
        info!(user_id = %user_id, amount = %amount, "profit credited");
        Ok(account)
    }

    pub async fn create(&self, session: &Session, mut draft: WithdrawalDraft) -> Result<CreatedWithdrawal> {
        let now = self.clock.now();
        session.authenticate(now)?;
        let user_id = session.user_id;
        draft.idempotency_key = draft
            .idempotency_key
            .take()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let result = match draft.idempotency_key.clone() {
            Some(key) => {
                let gate = self.key_gates.gate(user_id, &key).await;
                let result = {
                    let _held = gate.lock().await;
                    self.try_create(session, draft, now).await
                };
                self.key_gates.forget(user_id, &key, gate).await;
                result
            }
            None => self.try_create(session, draft, now).await,
        };
        if let Err(e) = &result {
            warn!(user_id = %user_id, error = %e, "withdrawal request refused");
        }
        result
    }

    async fn try_create(
        &self,
        session: &Session,
        draft: WithdrawalDraft,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<CreatedWithdrawal> {
        let quote = self.fees.compute_fee(draft.wallet_name, draft.amount)?;
        let amount = Amount::new(draft.amount)?;
        let idempotency_key = draft.idempotency_key;

        if let Some(key) = idempotency_key.as_deref()
            && let Some(existing) = self
                .withdrawals
                .find_by_idempotency_key(session.user_id, key)
                .await?
        {
            return self.replayed(existing).await;
        }

        let phone = PhoneNumber::parse(&draft.wallet_phone_no)?;
        let wallet = self
            .wallets
            .find(session.user_id, draft.wallet_name, &phone)
            .await?
            .ok_or(PayoutError::WalletNotFound)?;

        let account = self.accounts.reserve(session.user_id, amount).await?;
        let id = match self.withdrawals.next_id().await {
            Ok(id) => id,
            Err(e) => {
                self.undo_reservation(session.user_id, amount).await?;
                return Err(e);
            }
        };
        let request = WithdrawalRequest::pending(
            id,
            session,
            &wallet,
            amount,
            quote,
            now,
            idempotency_key,
        );

        match self.withdrawals.insert(request).await {
            Ok(Insertion::Inserted(request)) => {
                info!(
                    withdraw_id = %request.withdraw_id,
                    user_id = %request.user_id,
                    amount = %request.amount,
                    fee = %request.transaction_fee,
                    wallet = %request.wallet_name,
                    "withdrawal requested"
                );
                Ok(CreatedWithdrawal {
                    request,
                    new_balance: account.available,
                })
            }
            Ok(Insertion::Duplicate(existing)) => {
                self.undo_reservation(session.user_id, amount).await?;
                self.replayed(existing).await
            }
            Err(e) => {
                self.undo_reservation(session.user_id, amount).await?;
                Err(e)
            }
        }
    }

    async fn replayed(&self, existing: WithdrawalRequest) -> Result<CreatedWithdrawal> {
        info!(
            withdraw_id = %existing.withdraw_id,
            user_id = %existing.user_id,
            "idempotent withdrawal replay"
        );
        let available = self
            .accounts
            .get(existing.user_id)
            .await?
            .map(|account| account.available)
            .unwrap_or(Balance::ZERO);
        Ok(CreatedWithdrawal {
            request: existing,
            new_balance: available,
        })
    }

    async fn undo_reservation(&self, user_id: UserId, amount: Amount) -> Result<()> {
        if let Err(e) = self.accounts.release(user_id, amount).await {
            error!(user_id = %user_id, amount = %amount, error = %e, "failed to undo reservation");
            return Err(e);
        }
        Ok(())
    }

    /// Admin settlement: pays out the request and keeps the debit.
    pub async fn approve(
        &self,
        session: &Session,
        id: WithdrawalId,
        transaction_id: &str,
        transaction_phone_no: &str,
        remarks: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        session.authorize_admin(self.clock.now())?;
        let settlement = Settlement::approve(transaction_id, transaction_phone_no, remarks)?;
        self.settle(id, settlement).await
    }

    /// Admin settlement: refuses the request and returns the reservation.
    pub async fn reject(&self, session: &Session, id: WithdrawalId, remarks: &str) -> Result<WithdrawalRequest> {
        session.authorize_admin(self.clock.now())?;
        let settlement = Settlement::reject(remarks)?;
        self.settle(id, settlement).await
    }

    /// Owner withdrawal of a still-pending request; returns the reservation.
    pub async fn cancel(&self, session: &Session, id: WithdrawalId) -> Result<WithdrawalRequest> {
        session.authenticate(self.clock.now())?;
        let request = self
            .withdrawals
            .get(id)
            .await?
            .ok_or(PayoutError::NotFound(id))?;
        if request.user_id != session.user_id {
            warn!(withdraw_id = %id, user_id = %session.user_id, "cancel by non-owner refused");
            return Err(PayoutError::Forbidden);
        }
        self.settle(id, Settlement::Cancel).await
    }

    async fn settle(&self, id: WithdrawalId, settlement: Settlement) -> Result<WithdrawalRequest> {
        let target = settlement.target_status();
        let request = match self
            .withdrawals
            .settle(id, &settlement, self.clock.now())
            .await
        {
            Ok(request) => request,
            Err(e) => {
                warn!(withdraw_id = %id, target = %target, error = %e, "settlement refused");
                return Err(e);
            }
        };

        let ledger = if settlement.refunds() {
            self.accounts.release(request.user_id, request.amount).await
        } else {
            self.accounts.finalize(request.user_id, request.amount).await
        };
        if let Err(e) = ledger {
            error!(
                withdraw_id = %id,
                user_id = %request.user_id,
                status = %request.status,
                error = %e,
                "ledger update failed after settlement, reconcile the seller's ledger"
            );
            return Err(e);
        }

        info!(
            withdraw_id = %id,
            user_id = %request.user_id,
            amount = %request.amount,
            status = %request.status,
            "withdrawal settled"
        );
        Ok(request)
    }

    /// Admin repair of a seller's ledger after a settlement whose ledger write
    /// failed.
    ///
    /// `reserved` and `withdrawn` are recomputed from the stored requests:
    /// completed amounts missing from `withdrawn` are finalized out of the
    /// reservation, then any reservation no pending request accounts for goes
    /// back to `available`. Must not run while a creation for the same seller is
    /// in flight.
    pub async fn reconcile_ledger(&self, session: &Session, user_id: UserId) -> Result<SellerAccount> {
        session.authorize_admin(self.clock.now())?;

        let mut query = RequestQuery::new(u32::MAX);
        query.user_id = Some(user_id);
        let requests = self.withdrawals.query(&query).await?.requests;
        let mut pending = Decimal::ZERO;
        let mut completed = Decimal::ZERO;
        for request in &requests {
            match request.status {
                WithdrawalStatus::Pending => pending += request.amount.value(),
                WithdrawalStatus::Completed => completed += request.amount.value(),
                WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled => {}
            }
        }

        let mut account = self
            .accounts
            .get(user_id)
            .await?
            .unwrap_or_else(|| SellerAccount::new(user_id));
        if let Ok(unposted) = Amount::new(completed - account.withdrawn.value()) {
            account = self.accounts.finalize(user_id, unposted).await?;
            warn!(user_id = %user_id, amount = %unposted, "finalized unposted payout");
        }
        if let Ok(stranded) = Amount::new(account.reserved.value() - pending) {
            account = self.accounts.release(user_id, stranded).await?;
            warn!(user_id = %user_id, amount = %stranded, "released stranded reservation");
        }
        Ok(account)
    }

    /// A single request, visible to its owner and to admins.
    pub async fn get(&self, session: &Session, id: WithdrawalId) -> Result<WithdrawalRequest> {
        session.authenticate(self.clock.now())?;
        let request = self
            .withdrawals
            .get(id)
            .await?
            .ok_or(PayoutError::NotFound(id))?;
        if session.is_admin() || request.user_id == session.user_id {
            Ok(request)
        } else {
            Err(PayoutError::NotFound(id))
        }
    }

    /// Paginated request history. Sellers only ever see their own requests.
    pub async fn history(&self, session: &Session, query: &RequestQuery) -> Result<RequestPage> {
        session.authenticate(self.clock.now())?;
        self.validate_page(query)?;

        let mut query = query.clone();
        if !session.is_admin() {
            query.user_id = Some(session.user_id);
        }
        self.withdrawals.query(&query).await
    }

    /// Admin listing across all sellers.
    pub async fn review(&self, session: &Session, query: &RequestQuery) -> Result<RequestPage> {
        session.authorize_admin(self.clock.now())?;
        self.validate_page(query)?;
        self.withdrawals.query(query).await
    }

    pub fn page_sizes(&self) -> &[u32] {
        &self.page_sizes
    }

    fn validate_page(&self, query: &RequestQuery) -> Result<()> {
        if query.page == 0 {
            return Err(PayoutError::ValidationError(
                "page numbers start at 1".to_string(),
            ));
        }
        if !self.page_sizes.contains(&query.page_size) {
            return Err(PayoutError::ValidationError(format!(
                "page size must be one of {:?}",
                self.page_sizes
            )));
        }
        Ok(())
    }
}
