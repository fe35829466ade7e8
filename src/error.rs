use crate::domain::withdrawal::{WithdrawalId, WithdrawalStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Message returned to callers for any failure that is not their fault.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("{0}")]
    ValidationError(String),
    #[error("invalid withdrawal amount: {0}")]
    InvalidAmount(Decimal),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("wallet not found")]
    WalletNotFound,
    #[error("wallet already registered")]
    DuplicateWallet,
    #[error("phone number {0} has not been verified")]
    PhoneNotVerified(String),
    #[error("invalid OTP")]
    InvalidOtp,
    #[error("OTP has expired")]
    Expired,
    #[error("authentication required")]
    Unauthenticated,
    #[error("operation not permitted")]
    Forbidden,
    #[error("withdrawal request {id} is already {status}")]
    NotPending {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },
    #[error("withdrawal request {0} not found")]
    NotFound(WithdrawalId),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl PayoutError {
    /// HTTP-style status code reported in the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_)
            | Self::InvalidAmount(_)
            | Self::InsufficientBalance { .. }
            | Self::PhoneNotVerified(_)
            | Self::InvalidOtp => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::WalletNotFound | Self::NotFound(_) => 404,
            Self::DuplicateWallet | Self::NotPending { .. } => 409,
            Self::Expired => 410,
            _ => 500,
        }
    }

    /// Whether the error was caused by the caller's input or the current state,
    /// as opposed to a storage or transport failure.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            UNEXPECTED_ERROR_MESSAGE.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, PayoutError>;
