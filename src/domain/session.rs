use crate::error::PayoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Admin,
}

/// The authenticated caller of an operation.
///
/// Issued by the external authentication service and passed explicitly to every
/// operation instead of being read from ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub user_name: String,
    pub phone_no: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn seller(
        user_id: UserId,
        user_name: impl Into<String>,
        phone_no: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            phone_no: phone_no.into(),
            role: Role::Seller,
            expires_at,
        }
    }

    pub fn admin(user_id: UserId, user_name: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            phone_no: String::new(),
            role: Role::Admin,
            expires_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Unauthenticated` once the session has expired.
    pub fn authenticate(&self, now: DateTime<Utc>) -> Result<&Self, PayoutError> {
        if now < self.expires_at {
            Ok(self)
        } else {
            Err(PayoutError::Unauthenticated)
        }
    }

    /// Like [`Session::authenticate`], additionally requiring the admin role.
    pub fn authorize_admin(&self, now: DateTime<Utc>) -> Result<&Self, PayoutError> {
        self.authenticate(now)?;
        if self.is_admin() {
            Ok(self)
        } else {
            Err(PayoutError::Forbidden)
        }
    }
}
