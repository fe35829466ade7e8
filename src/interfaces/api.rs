//! Request/response facade used by the storefront and the admin console.
//!
//! Every call answers with the same [`ApiResponse`] envelope. Failures never
//! escape as errors: client errors carry their own message and status code,
//! anything else becomes a generic 500.

use crate::application::wallet_registry::WalletRegistry;
use crate::application::withdrawal::{WithdrawalDraft, WithdrawalLifecycle};
use crate::config::Config;
use crate::domain::account::{Amount, SellerAccount};
use crate::domain::fee::FeeQuote;
use crate::domain::ports::{
    AccountStoreRef, ClockRef, OtpGeneratorRef, OtpStoreRef, SmsGatewayRef, WalletStoreRef,
    WithdrawalStoreRef,
};
use crate::domain::query::{RequestPage, RequestQuery};
use crate::domain::session::{Session, UserId};
use crate::domain::wallet::{Wallet, WalletId, WalletName};
use crate::domain::withdrawal::{WithdrawalId, WithdrawalRequest, WithdrawalStatus};
use crate::error::{PayoutError, Result, UNEXPECTED_ERROR_MESSAGE};
use crate::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryOtpStore, InMemoryWalletStore, InMemoryWithdrawalStore,
};
use crate::infrastructure::system::{LoggingSmsGateway, RandomOtpGenerator, SystemClock};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: Option<&str>) -> Self {
        Self {
            success: true,
            message: message.map(str::to_string),
            data: Some(data),
            status_code: 200,
        }
    }

    pub fn failure(err: &PayoutError) -> Self {
        if !err.is_client_error() {
            error!(error = %err, "request failed");
        }
        Self {
            success: false,
            message: Some(err.public_message()),
            data: None,
            status_code: err.status_code(),
        }
    }

    /// The envelope every transport or decoding failure is normalized to.
    pub fn unexpected() -> Self {
        Self {
            success: false,
            message: Some(UNEXPECTED_ERROR_MESSAGE.to_string()),
            data: None,
            status_code: 500,
        }
    }

    pub fn from_result(result: Result<T>, message: &str) -> Self {
        match result {
            Ok(data) => Self::ok(data, Some(message)),
            Err(e) => Self::failure(&e),
        }
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Decodes a response body, treating a malformed payload as a failed call.
    pub fn decode(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self::unexpected())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpStatus {
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawReceipt {
    pub withdraw_id: WithdrawalId,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    /// `None` lists every status.
    pub status: Option<WithdrawalStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveWithdrawRequest {
    pub id: WithdrawalId,
    pub transaction_id: String,
    pub transaction_phone_no: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectWithdrawRequest {
    pub id: WithdrawalId,
    pub remarks: String,
}

/// The storage backends behind the facade.
#[derive(Clone)]
pub struct Stores {
    pub accounts: AccountStoreRef,
    pub wallets: WalletStoreRef,
    pub withdrawals: WithdrawalStoreRef,
    pub otps: OtpStoreRef,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountStore::new()),
            wallets: Arc::new(InMemoryWalletStore::new()),
            withdrawals: Arc::new(InMemoryWithdrawalStore::new()),
            otps: Arc::new(InMemoryOtpStore::new()),
        }
    }
}

/// Outbound collaborators and the time source.
#[derive(Clone)]
pub struct Gateways {
    pub sms: SmsGatewayRef,
    pub otp_generator: OtpGeneratorRef,
    pub clock: ClockRef,
}

impl Default for Gateways {
    fn default() -> Self {
        Self {
            sms: Arc::new(LoggingSmsGateway),
            otp_generator: Arc::new(RandomOtpGenerator),
            clock: Arc::new(SystemClock),
        }
    }
}

pub struct MarketplaceApi {
    registry: WalletRegistry,
    lifecycle: Arc<WithdrawalLifecycle>,
    default_page_size: u32,
}

fn require(session: Option<&Session>) -> Result<&Session> {
    session.ok_or(PayoutError::Unauthenticated)
}

impl MarketplaceApi {
    pub fn new(stores: Stores, gateways: Gateways, config: &Config) -> Self {
        let registry = WalletRegistry::new(
            stores.wallets.clone(),
            stores.otps,
            gateways.sms,
            gateways.otp_generator,
            gateways.clock.clone(),
            config,
        );
        let lifecycle = Arc::new(WithdrawalLifecycle::new(
            stores.accounts,
            stores.wallets,
            stores.withdrawals,
            gateways.clock,
            config,
        ));
        Self {
            registry,
            lifecycle,
            default_page_size: config.default_page_size,
        }
    }

    /// The lifecycle shared with admin review queues.
    pub fn lifecycle(&self) -> Arc<WithdrawalLifecycle> {
        self.lifecycle.clone()
    }

    pub async fn send_wallet_otp(&self, session: Option<&Session>, phone_no: &str) -> ApiResponse<OtpStatus> {
        let result = async {
            let dispatch = self
                .registry
                .send_verification_otp(require(session)?, phone_no)
                .await?;
            Ok::<_, PayoutError>(OtpStatus {
                is_verified: dispatch.is_verified(),
            })
        }
        .await;
        let message = match &result {
            Ok(OtpStatus { is_verified: true }) => "Phone number already verified",
            _ => "OTP sent",
        };
        ApiResponse::from_result(result, message)
    }

    pub async fn verify_wallet_otp(&self, session: Option<&Session>, phone_no: &str, otp: &str) -> ApiResponse<()> {
        let result = async {
            self.registry
                .verify_otp(require(session)?, phone_no, otp)
                .await
        }
        .await;
        ApiResponse::from_result(result, "Phone number verified")
    }

    pub async fn list_wallets(&self, session: Option<&Session>) -> ApiResponse<Vec<Wallet>> {
        let result = async { self.registry.list_wallets(require(session)?).await }.await;
        ApiResponse::from_result(result, "Wallets fetched")
    }

    pub async fn add_wallet(&self, session: Option<&Session>, phone_no: &str, wallet_name: &str) -> ApiResponse<Wallet> {
        let result = async {
            let session = require(session)?;
            let wallet_name: WalletName = wallet_name.parse()?;
            self.registry.add_wallet(session, phone_no, wallet_name).await
        }
        .await;
        ApiResponse::from_result(result, "Wallet added")
    }

    pub async fn remove_wallet(&self, session: Option<&Session>, wallet_id: WalletId) -> ApiResponse<()> {
        let result = async { self.registry.remove_wallet(require(session)?, wallet_id).await }.await;
        ApiResponse::from_result(result, "Wallet removed")
    }

    pub async fn get_withdraw(&self, session: Option<&Session>, id: WithdrawalId) -> ApiResponse<WithdrawalRequest> {
        let result = async { self.lifecycle.get(require(session)?, id).await }.await;
        ApiResponse::from_result(result, "Withdrawal request fetched")
    }

    pub async fn request_withdraw(&self, session: Option<&Session>, draft: WithdrawalDraft) -> ApiResponse<WithdrawReceipt> {
        let result = async {
            let created = self.lifecycle.create(require(session)?, draft).await?;
            Ok::<_, PayoutError>(WithdrawReceipt {
                withdraw_id: created.request.withdraw_id,
                new_balance: created.new_balance.value(),
            })
        }
        .await;
        ApiResponse::from_result(result, "Withdrawal request submitted")
    }

    pub async fn list_withdraw_history(
        &self,
        session: Option<&Session>,
        request: HistoryRequest,
    ) -> ApiResponse<RequestPage> {
        let result = async {
            let session = require(session)?;
            let query = RequestQuery {
                status: request.status,
                user_id: None,
                page: request.page.unwrap_or(1),
                page_size: request.page_size.unwrap_or(self.default_page_size),
                search: request.search,
            };
            self.lifecycle.history(session, &query).await
        }
        .await;
        ApiResponse::from_result(result, "Withdrawal history fetched")
    }

    pub async fn cancel_withdraw(&self, session: Option<&Session>, id: WithdrawalId) -> ApiResponse<WithdrawalRequest> {
        let result = async { self.lifecycle.cancel(require(session)?, id).await }.await;
        ApiResponse::from_result(result, "Withdrawal request cancelled")
    }

    pub async fn approve_withdraw(
        &self,
        session: Option<&Session>,
        request: ApproveWithdrawRequest,
    ) -> ApiResponse<WithdrawalRequest> {
        let result = async {
            self.lifecycle
                .approve(
                    require(session)?,
                    request.id,
                    &request.transaction_id,
                    &request.transaction_phone_no,
                    request.remarks.as_deref(),
                )
                .await
        }
        .await;
        ApiResponse::from_result(result, "Withdrawal request approved")
    }

    pub async fn reject_withdraw(
        &self,
        session: Option<&Session>,
        request: RejectWithdrawRequest,
    ) -> ApiResponse<WithdrawalRequest> {
        let result = async {
            self.lifecycle
                .reject(require(session)?, request.id, &request.remarks)
                .await
        }
        .await;
        ApiResponse::from_result(result, "Withdrawal request rejected")
    }

    /// Fee preview shown while the seller types an amount.
    pub fn quote_withdraw_fee(&self, wallet_name: &str, amount: Decimal) -> ApiResponse<FeeQuote> {
        let result = wallet_name
            .parse::<WalletName>()
            .and_then(|wallet_name| self.lifecycle.quote(wallet_name, amount));
        ApiResponse::from_result(result, "Fee calculated")
    }

    pub async fn reconcile_ledger(&self, session: Option<&Session>, user_id: UserId) -> ApiResponse<SellerAccount> {
        let result = async {
            self.lifecycle
                .reconcile_ledger(require(session)?, user_id)
                .await
        }
        .await;
        ApiResponse::from_result(result, "Ledger reconciled")
    }

    pub async fn balance(&self, session: Option<&Session>) -> ApiResponse<SellerAccount> {
        let result = async { self.lifecycle.balance(require(session)?).await }.await;
        ApiResponse::from_result(result, "Balance fetched")
    }

    /// Books resale profit for a seller. Called by order settlement, not by users.
    pub async fn credit_profit(&self, user_id: UserId, amount: Decimal) -> ApiResponse<SellerAccount> {
        let result = async {
            let amount = Amount::new(amount)?;
            self.lifecycle.accrue_profit(user_id, amount).await
        }
        .await;
        ApiResponse::from_result(result, "Profit credited")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::system::{FixedClock, FixedOtpGenerator};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn api() -> (MarketplaceApi, Session, Session) {
        let start = Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap();
        let gateways = Gateways {
            sms: Arc::new(LoggingSmsGateway),
            otp_generator: Arc::new(FixedOtpGenerator::new("246810")),
            clock: Arc::new(FixedClock::new(start)),
        };
        let api = MarketplaceApi::new(Stores::in_memory(), gateways, &Config::default());
        let expires = start + Duration::hours(1);
        (
            api,
            Session::seller(UserId(1), "Rahim", "01700000001", expires),
            Session::admin(UserId(100), "ops", expires),
        )
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthenticated() {
        let (api, _, _) = api();
        let response = api.list_wallets(None).await;
        assert!(!response.success);
        assert_eq!(response.status_code, 401);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_wallet_then_withdraw_flow() {
        let (api, seller, _) = api();
        let session = Some(&seller);

        let sent = api.send_wallet_otp(session, "01811111111").await;
        assert_eq!(sent.data, Some(OtpStatus { is_verified: false }));
        assert!(api.verify_wallet_otp(session, "01811111111", "246810").await.success);

        let wallet = api.add_wallet(session, "01811111111", "bKash").await;
        assert_eq!(wallet.status_code, 200);

        let again = api.send_wallet_otp(session, "01811111111").await;
        assert_eq!(again.data, Some(OtpStatus { is_verified: true }));

        assert!(api.credit_profit(UserId(1), dec!(1200)).await.success);
        let receipt = api
            .request_withdraw(
                session,
                WithdrawalDraft {
                    amount: dec!(1000),
                    wallet_name: WalletName::BKash,
                    wallet_phone_no: "01811111111".to_string(),
                    idempotency_key: None,
                },
            )
            .await;
        assert!(receipt.success);
        assert_eq!(receipt.data.unwrap().new_balance, dec!(200));
    }

    #[tokio::test]
    async fn test_errors_map_to_status_codes() {
        let (api, seller, admin) = api();

        let bad_wallet = api.add_wallet(Some(&seller), "01811111111", "rocket").await;
        assert_eq!(bad_wallet.status_code, 400);

        let unverified = api.add_wallet(Some(&seller), "01811111111", "Nagad").await;
        assert_eq!(unverified.status_code, 400);

        let missing = api
            .reject_withdraw(
                Some(&admin),
                RejectWithdrawRequest {
                    id: WithdrawalId(5),
                    remarks: "no such request".to_string(),
                },
            )
            .await;
        assert_eq!(missing.status_code, 404);

        let forbidden = api
            .approve_withdraw(
                Some(&seller),
                ApproveWithdrawRequest {
                    id: WithdrawalId(5),
                    transaction_id: "TXN".to_string(),
                    transaction_phone_no: "01900000000".to_string(),
                    remarks: None,
                },
            )
            .await;
        assert_eq!(forbidden.status_code, 403);
    }

    #[tokio::test]
    async fn test_fee_preview_and_reconcile() {
        let (api, seller, admin) = api();

        let quote = api.quote_withdraw_fee("Nagad", dec!(3000));
        assert_eq!(
            quote.data,
            Some(FeeQuote {
                transaction_fee: dec!(15),
                actual_amount: dec!(2985),
            })
        );
        assert_eq!(api.quote_withdraw_fee("rocket", dec!(3000)).status_code, 400);
        assert_eq!(api.quote_withdraw_fee("bKash", dec!(20)).status_code, 400);

        assert!(api.credit_profit(UserId(1), dec!(700)).await.success);
        assert_eq!(api.reconcile_ledger(Some(&seller), UserId(1)).await.status_code, 403);
        let account = api.reconcile_ledger(Some(&admin), UserId(1)).await.data.unwrap();
        assert_eq!(account.available.value(), dec!(700));
        assert_eq!(account.reserved.value(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_history_defaults() {
        let (api, seller, _) = api();
        let page = api
            .list_withdraw_history(Some(&seller), HistoryRequest::default())
            .await;
        let page = page.data.unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.total_pages, 0);

        let bad = api
            .list_withdraw_history(
                Some(&seller),
                HistoryRequest {
                    page_size: Some(11),
                    ..HistoryRequest::default()
                },
            )
            .await;
        assert_eq!(bad.status_code, 400);
    }

    #[test]
    fn test_malformed_payload_is_normalized() {
        let response: ApiResponse<OtpStatus> = ApiResponse::decode(b"<html>502 Bad Gateway</html>");
        assert_eq!(response, ApiResponse::unexpected());
        assert_eq!(response.message.as_deref(), Some("An unexpected error occurred"));

        let body = br#"{"success":true,"message":null,"data":{"isVerified":true},"statusCode":200}"#;
        let response: ApiResponse<OtpStatus> = ApiResponse::decode(body);
        assert_eq!(response.data, Some(OtpStatus { is_verified: true }));
    }

    #[test]
    fn test_internal_error_is_masked() {
        let response: ApiResponse<()> =
            ApiResponse::failure(&PayoutError::InternalError("rocksdb exploded".to_string()));
        assert_eq!(response.status_code, 500);
        assert_eq!(response.message.as_deref(), Some(UNEXPECTED_ERROR_MESSAGE));
    }
}
