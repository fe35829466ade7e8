use crate::domain::account::Amount;
use crate::domain::fee::FeeQuote;
use crate::domain::session::{Session, UserId};
use crate::domain::wallet::{PhoneNumber, Wallet, WalletName};
use crate::error::PayoutError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WithdrawalId(pub u64);

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Completed,
    Rejected,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != Self::Pending
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PayoutError::ValidationError(format!(
                "unknown withdrawal status: {other}"
            ))),
        }
    }
}

/// A transition that takes a request out of `pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Approve {
        transaction_id: String,
        transaction_phone_no: PhoneNumber,
        remarks: Option<String>,
    },
    Reject {
        remarks: String,
    },
    Cancel,
}

impl Settlement {
    pub fn approve(
        transaction_id: &str,
        transaction_phone_no: &str,
        remarks: Option<&str>,
    ) -> Result<Self, PayoutError> {
        Ok(Self::Approve {
            transaction_id: required("transaction id", transaction_id)?,
            transaction_phone_no: PhoneNumber::parse(transaction_phone_no)?,
            remarks: remarks
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        })
    }

    pub fn reject(remarks: &str) -> Result<Self, PayoutError> {
        Ok(Self::Reject {
            remarks: required("remarks", remarks)?,
        })
    }

    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            Self::Approve { .. } => WithdrawalStatus::Completed,
            Self::Reject { .. } => WithdrawalStatus::Rejected,
            Self::Cancel => WithdrawalStatus::Cancelled,
        }
    }

    /// Whether the reserved amount goes back to the seller's available balance.
    pub fn refunds(&self) -> bool {
        !matches!(self, Self::Approve { .. })
    }
}

fn required(field: &str, value: &str) -> Result<String, PayoutError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PayoutError::ValidationError(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

/// A seller's request to cash out part of their balance.
///
/// `amount`, `transaction_fee` and `actual_amount` are fixed when the request is
/// created; later fee schedule changes never touch existing requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub withdraw_id: WithdrawalId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_phone_no: String,
    pub amount: Amount,
    pub transaction_fee: Decimal,
    pub actual_amount: Decimal,
    pub wallet_name: WalletName,
    pub wallet_phone_no: PhoneNumber,
    pub transaction_id: Option<String>,
    pub transaction_phone_no: Option<PhoneNumber>,
    pub remarks: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: WithdrawalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl WithdrawalRequest {
    pub fn pending(
        withdraw_id: WithdrawalId,
        session: &Session,
        wallet: &Wallet,
        amount: Amount,
        quote: FeeQuote,
        requested_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            withdraw_id,
            user_id: session.user_id,
            user_name: session.user_name.clone(),
            user_phone_no: session.phone_no.clone(),
            amount,
            transaction_fee: quote.transaction_fee,
            actual_amount: quote.actual_amount,
            wallet_name: wallet.wallet_name,
            wallet_phone_no: wallet.wallet_phone_no.clone(),
            transaction_id: None,
            transaction_phone_no: None,
            remarks: None,
            requested_at,
            processed_at: None,
            status: WithdrawalStatus::Pending,
            idempotency_key,
        }
    }

    /// Applies `settlement` if the request is still pending.
    ///
    /// On failure the request is left untouched.
    pub fn settle(&mut self, settlement: &Settlement, now: DateTime<Utc>) -> Result<(), PayoutError> {
        if self.status != WithdrawalStatus::Pending {
            return Err(PayoutError::NotPending {
                id: self.withdraw_id,
                status: self.status,
            });
        }

        match settlement {
            Settlement::Approve {
                transaction_id,
                transaction_phone_no,
                remarks,
            } => {
                self.transaction_id = Some(transaction_id.clone());
                self.transaction_phone_no = Some(transaction_phone_no.clone());
                self.remarks = remarks.clone();
            }
            Settlement::Reject { remarks } => {
                self.remarks = Some(remarks.clone());
            }
            Settlement::Cancel => {}
        }
        self.status = settlement.target_status();
        self.processed_at = Some(now);
        Ok(())
    }

    /// Case-insensitive substring match on the user phone, wallet phone and
    /// transaction id. `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.user_phone_no.to_lowercase().contains(needle)
            || self.wallet_phone_no.as_str().to_lowercase().contains(needle)
            || self
                .transaction_id
                .as_deref()
                .is_some_and(|txn| txn.to_lowercase().contains(needle))
    }
}
