use crate::config::Config;
use crate::domain::otp::{OtpChallenge, validate_code_format};
use crate::domain::ports::{ClockRef, OtpGeneratorRef, OtpStoreRef, SmsGatewayRef, WalletStoreRef};
use crate::domain::session::Session;
use crate::domain::wallet::{PhoneNumber, Wallet, WalletId, WalletName};
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of asking for a verification code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OtpDispatch {
    /// The number was verified before; no code was sent.
    AlreadyVerified,
    CodeSent { expires_at: DateTime<Utc> },
}

impl OtpDispatch {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::AlreadyVerified)
    }
}

/// Payout wallets of each seller, registered behind phone verification.
pub struct WalletRegistry {
    wallets: WalletStoreRef,
    otps: OtpStoreRef,
    sms: SmsGatewayRef,
    generator: OtpGeneratorRef,
    clock: ClockRef,
    otp_ttl: chrono::Duration,
    otp_digits: usize,
    otp_max_attempts: u32,
}

impl WalletRegistry {
    pub fn new(
        wallets: WalletStoreRef,
        otps: OtpStoreRef,
        sms: SmsGatewayRef,
        generator: OtpGeneratorRef,
        clock: ClockRef,
        config: &Config,
    ) -> Self {
        Self {
            wallets,
            otps,
            sms,
            generator,
            clock,
            otp_ttl: config.otp_ttl(),
            otp_digits: config.otp_digits,
            otp_max_attempts: config.otp_max_attempts,
        }
    }

    pub async fn list_wallets(&self, session: &Session) -> Result<Vec<Wallet>> {
        session.authenticate(self.clock.now())?;
        self.wallets.list(session.user_id).await
    }

    pub async fn send_verification_otp(&self, session: &Session, phone_no: &str) -> Result<OtpDispatch> {
        let now = self.clock.now();
        session.authenticate(now)?;
        let phone = PhoneNumber::parse(phone_no)?;

        if self.otps.is_verified(&phone).await? {
            return Ok(OtpDispatch::AlreadyVerified);
        }

        let code = self.generator.generate(self.otp_digits);
        let challenge = OtpChallenge::new(phone.clone(), code, now, self.otp_ttl, self.otp_max_attempts);
        let expires_at = challenge.expires_at;
        self.sms.send_otp(&phone, &challenge.code).await?;
        self.otps.issue(challenge).await?;

        info!(user_id = %session.user_id, phone = %phone, "verification code sent");
        Ok(OtpDispatch::CodeSent { expires_at })
    }

    pub async fn verify_otp(&self, session: &Session, phone_no: &str, code: &str) -> Result<()> {
        let now = self.clock.now();
        session.authenticate(now)?;
        let phone = PhoneNumber::parse(phone_no)?;
        let code = code.trim();
        validate_code_format(code, self.otp_digits)?;

        match self.otps.verify(&phone, code, now).await {
            Ok(()) => {
                info!(user_id = %session.user_id, phone = %phone, "phone verified");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %session.user_id, phone = %phone, error = %e, "verification failed");
                Err(e)
            }
        }
    }

    pub async fn add_wallet(&self, session: &Session, phone_no: &str, wallet_name: WalletName) -> Result<Wallet> {
        let now = self.clock.now();
        session.authenticate(now)?;
        let phone = PhoneNumber::parse(phone_no)?;

        if !self.otps.is_verified(&phone).await? {
            return Err(PayoutError::PhoneNotVerified(phone.to_string()));
        }

        let wallet = self
            .wallets
            .insert(session.user_id, wallet_name, phone, now)
            .await?;
        info!(
            user_id = %session.user_id,
            wallet_id = %wallet.wallet_id,
            wallet = %wallet.wallet_name,
            "wallet added"
        );
        Ok(wallet)
    }

    pub async fn remove_wallet(&self, session: &Session, wallet_id: WalletId) -> Result<()> {
        session.authenticate(self.clock.now())?;
        if self.wallets.remove(session.user_id, wallet_id).await? {
            info!(user_id = %session.user_id, wallet_id = %wallet_id, "wallet removed");
            Ok(())
        } else {
            Err(PayoutError::WalletNotFound)
        }
    }
}
