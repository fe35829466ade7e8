use crate::domain::session::UserId;
use crate::error::PayoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported mobile-money providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WalletName {
    #[serde(rename = "bKash")]
    BKash,
    #[serde(rename = "Nagad")]
    Nagad,
}

impl WalletName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BKash => "bKash",
            Self::Nagad => "Nagad",
        }
    }
}

impl fmt::Display for WalletName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletName {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bkash" => Ok(Self::BKash),
            "nagad" => Ok(Self::Nagad),
            other => Err(PayoutError::ValidationError(format!(
                "unsupported wallet: {other}"
            ))),
        }
    }
}

/// A normalized mobile phone number: digits only, optionally prefixed by `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 10;
    const MAX_DIGITS: usize = 15;

    pub fn parse(raw: &str) -> Result<Self, PayoutError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let valid = (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit());
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(PayoutError::ValidationError(format!(
                "invalid phone number: {raw:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletId(pub u64);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A verified payout destination owned by one seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub wallet_name: WalletName,
    pub wallet_phone_no: PhoneNumber,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Whether this wallet is the `(wallet_name, phone)` destination.
    pub fn matches(&self, wallet_name: WalletName, phone: &PhoneNumber) -> bool {
        self.wallet_name == wallet_name && &self.wallet_phone_no == phone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_name_parsing() {
        assert_eq!("bKash".parse::<WalletName>().unwrap(), WalletName::BKash);
        assert_eq!(" NAGAD ".parse::<WalletName>().unwrap(), WalletName::Nagad);
        assert!(matches!(
            "rocket".parse::<WalletName>(),
            Err(PayoutError::ValidationError(_))
        ));
    }

    #[test]
    fn test_wallet_name_serde_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&WalletName::BKash).unwrap(),
            "\"bKash\""
        );
        let parsed: WalletName = serde_json::from_str("\"Nagad\"").unwrap();
        assert_eq!(parsed, WalletName::Nagad);
    }

    #[test]
    fn test_phone_number_validation() {
        assert_eq!(
            PhoneNumber::parse(" 01711111111 ").unwrap().as_str(),
            "01711111111"
        );
        assert!(PhoneNumber::parse("+8801711111111").is_ok());
        assert!(PhoneNumber::parse("0171").is_err());
        assert!(PhoneNumber::parse("01711-11111").is_err());
        assert!(PhoneNumber::parse("").is_err());
    }
}
