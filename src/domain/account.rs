use crate::domain::session::UserId;
use crate::error::PayoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Represents a monetary value held in a seller's ledger.
///
/// This is a wrapper around `rust_decimal::Decimal` so that ledger figures and
/// request amounts cannot be mixed up by accident.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// Represents a strictly positive monetary amount.
///
/// Every value that moves money (credits, withdrawal amounts) is an `Amount`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PayoutError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PayoutError::ValidationError(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PayoutError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Ledger state of a seller's accumulated profit.
///
/// `available` is what a new withdrawal may draw from, `reserved` is locked by
/// pending withdrawal requests and `withdrawn` is what completed requests paid out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SellerAccount {
    pub user_id: UserId,
    pub available: Balance,
    pub reserved: Balance,
    pub withdrawn: Balance,
}

impl SellerAccount {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            available: Balance::ZERO,
            reserved: Balance::ZERO,
            withdrawn: Balance::ZERO,
        }
    }

    /// Accrues profit into the available balance
    pub fn credit(&mut self, amount: Amount) {
        self.available += amount.into();
    }

    /// Moves funds from available to reserved if sufficient
    pub fn reserve(&mut self, amount: Amount) -> Result<(), PayoutError> {
        let amount = Balance::from(amount);
        if self.available >= amount {
            self.available -= amount;
            self.reserved += amount;
            Ok(())
        } else {
            Err(PayoutError::InsufficientBalance {
                available: self.available.value(),
                requested: amount.value(),
            })
        }
    }

    /// Returns a reservation to the available balance
    pub fn release(&mut self, amount: Amount) -> Result<(), PayoutError> {
        let amount = Balance::from(amount);
        if self.reserved >= amount {
            self.reserved -= amount;
            self.available += amount;
            Ok(())
        } else {
            Err(PayoutError::InternalError(format!(
                "reservation mismatch for user {}: reserved {}, releasing {}",
                self.user_id, self.reserved, amount
            )))
        }
    }

    /// Turns a reservation into a permanent debit
    pub fn finalize(&mut self, amount: Amount) -> Result<(), PayoutError> {
        let amount = Balance::from(amount);
        if self.reserved >= amount {
            self.reserved -= amount;
            self.withdrawn += amount;
            Ok(())
        } else {
            Err(PayoutError::InternalError(format!(
                "reservation mismatch for user {}: reserved {}, finalizing {}",
                self.user_id, self.reserved, amount
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PayoutError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PayoutError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_deserialization_rejects_negative() {
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
        let parsed: Amount = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(parsed.value(), dec!(12.5));
    }

    #[test]
    fn test_account_credit() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(10.0)));
        assert_eq!(account.available, Balance::new(dec!(10.0)));
        assert_eq!(account.reserved, Balance::ZERO);
    }

    #[test]
    fn test_account_reserve_success() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(2000)));

        account.reserve(amount(dec!(1500))).unwrap();
        assert_eq!(account.available, Balance::new(dec!(500)));
        assert_eq!(account.reserved, Balance::new(dec!(1500)));
    }

    #[test]
    fn test_account_reserve_insufficient() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(10.0)));

        let result = account.reserve(amount(dec!(20.0)));
        assert!(matches!(
            result,
            Err(PayoutError::InsufficientBalance { .. })
        ));
        assert_eq!(account.available, Balance::new(dec!(10.0)));
        assert_eq!(account.reserved, Balance::ZERO);
    }

    #[test]
    fn test_account_release() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(100)));
        account.reserve(amount(dec!(60))).unwrap();

        account.release(amount(dec!(60))).unwrap();
        assert_eq!(account.available, Balance::new(dec!(100)));
        assert_eq!(account.reserved, Balance::ZERO);
    }

    #[test]
    fn test_account_finalize() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(100)));
        account.reserve(amount(dec!(60))).unwrap();

        account.finalize(amount(dec!(60))).unwrap();
        assert_eq!(account.available, Balance::new(dec!(40)));
        assert_eq!(account.reserved, Balance::ZERO);
        assert_eq!(account.withdrawn, Balance::new(dec!(60)));
    }

    #[test]
    fn test_release_more_than_reserved_fails() {
        let mut account = SellerAccount::new(UserId(1));
        account.credit(amount(dec!(100)));

        assert!(matches!(
            account.release(amount(dec!(1))),
            Err(PayoutError::InternalError(_))
        ));
        assert_eq!(account.available, Balance::new(dec!(100)));
    }
}
