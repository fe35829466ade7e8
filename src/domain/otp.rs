use crate::domain::wallet::PhoneNumber;
use crate::error::PayoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A one-time code issued to a phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub phone: PhoneNumber,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    /// Wrong codes submitted so far.
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
}

impl OtpChallenge {
    pub fn new(
        phone: PhoneNumber,
        code: String,
        issued_at: DateTime<Utc>,
        ttl: chrono::Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            phone,
            code,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
            attempts: 0,
            max_attempts,
        }
    }

    /// Seconds left before the code expires, never negative.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Checks `code` against this challenge and consumes it on success.
    ///
    /// A challenge accepts exactly one correct submission; anything after that is
    /// reported as an invalid code. The `max_attempts`-th wrong code burns the
    /// challenge too, and the seller has to request a new one.
    pub fn verify(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), PayoutError> {
        if self.consumed {
            return Err(PayoutError::InvalidOtp);
        }
        if now >= self.expires_at {
            return Err(PayoutError::Expired);
        }
        if self.code != code {
            self.attempts += 1;
            if self.attempts >= self.max_attempts {
                self.consumed = true;
            }
            return Err(PayoutError::InvalidOtp);
        }
        self.consumed = true;
        Ok(())
    }
}

/// Rejects anything that is not exactly `digits` ASCII digits.
pub fn validate_code_format(code: &str, digits: usize) -> Result<(), PayoutError> {
    if code.len() == digits && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PayoutError::ValidationError(format!(
            "OTP must be {digits} digits"
        )))
    }
}
