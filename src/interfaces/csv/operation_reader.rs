use crate::domain::session::UserId;
use crate::domain::wallet::WalletName;
use crate::domain::withdrawal::WithdrawalId;
use crate::error::{PayoutError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Credit,
    SendOtp,
    VerifyOtp,
    AddWallet,
    Withdraw,
    Approve,
    Reject,
    Cancel,
}

/// One raw CSV row. Columns a kind does not use are left empty.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OperationKind,
    pub user: u64,
    pub request: Option<u64>,
    pub amount: Option<Decimal>,
    pub wallet: Option<String>,
    pub phone: Option<String>,
    pub reference: Option<String>,
    pub remarks: Option<String>,
}

/// A replayable operation with the fields its kind requires.
///
/// `reference` carries the OTP code for `verify_otp`, the idempotency key for
/// `withdraw` and the transfer id for `approve`.
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Credit {
        user: UserId,
        amount: Decimal,
        phone: Option<String>,
    },
    SendOtp {
        user: UserId,
        phone: String,
    },
    VerifyOtp {
        user: UserId,
        phone: String,
        code: Option<String>,
    },
    AddWallet {
        user: UserId,
        wallet: String,
        phone: String,
    },
    Withdraw {
        user: UserId,
        amount: Decimal,
        wallet: WalletName,
        phone: String,
        idempotency_key: Option<String>,
    },
    Approve {
        admin: UserId,
        request: WithdrawalId,
        transaction_id: String,
        transaction_phone_no: String,
        remarks: Option<String>,
    },
    Reject {
        admin: UserId,
        request: WithdrawalId,
        remarks: String,
    },
    Cancel {
        user: UserId,
        request: WithdrawalId,
    },
}

impl Operation {
    pub fn user(&self) -> UserId {
        match self {
            Self::Credit { user, .. }
            | Self::SendOtp { user, .. }
            | Self::VerifyOtp { user, .. }
            | Self::AddWallet { user, .. }
            | Self::Withdraw { user, .. }
            | Self::Cancel { user, .. } => *user,
            Self::Approve { admin, .. } | Self::Reject { admin, .. } => *admin,
        }
    }
}

fn required<T>(value: Option<T>, op: OperationKind, column: &str) -> Result<T> {
    value.ok_or_else(|| PayoutError::ValidationError(format!("{op:?} requires `{column}`")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<OperationRecord> for Operation {
    type Error = PayoutError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let op = record.op;
        let user = UserId(record.user);
        let phone = non_empty(record.phone);
        let reference = non_empty(record.reference);
        let remarks = non_empty(record.remarks);
        let request = record.request.map(WithdrawalId);

        Ok(match op {
            OperationKind::Credit => Self::Credit {
                user,
                amount: required(record.amount, op, "amount")?,
                phone,
            },
            OperationKind::SendOtp => Self::SendOtp {
                user,
                phone: required(phone, op, "phone")?,
            },
            OperationKind::VerifyOtp => Self::VerifyOtp {
                user,
                phone: required(phone, op, "phone")?,
                code: reference,
            },
            OperationKind::AddWallet => Self::AddWallet {
                user,
                wallet: required(non_empty(record.wallet), op, "wallet")?,
                phone: required(phone, op, "phone")?,
            },
            OperationKind::Withdraw => Self::Withdraw {
                user,
                amount: required(record.amount, op, "amount")?,
                wallet: required(non_empty(record.wallet), op, "wallet")?.parse()?,
                phone: required(phone, op, "phone")?,
                idempotency_key: reference,
            },
            OperationKind::Approve => Self::Approve {
                admin: user,
                request: required(request, op, "request")?,
                transaction_id: required(reference, op, "reference")?,
                transaction_phone_no: required(phone, op, "phone")?,
                remarks,
            },
            OperationKind::Reject => Self::Reject {
                admin: user,
                request: required(request, op, "request")?,
                remarks: required(remarks, op, "remarks")?,
            },
            OperationKind::Cancel => Self::Cancel {
                user,
                request: required(request, op, "request")?,
            },
        })
    }
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, so
/// trailing unused columns may be omitted.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads, deserializes and checks each row.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader.into_deserialize().map(|row| {
            let record: OperationRecord = row?;
            Operation::try_from(record)
        })
    }
}
