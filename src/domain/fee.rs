//! Withdrawal fee schedule.
//!
//! Fees are table driven: a schedule is a minimum withdrawal amount plus an ordered
//! list of brackets, each scoped to one wallet provider. The first bracket whose
//! range contains the amount decides the fee.

use crate::domain::wallet::WalletName;
use crate::error::PayoutError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How a bracket turns an amount into a fee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeRule {
    /// The same fee for every amount in the bracket.
    Flat { fee: Decimal },
    /// `floor(amount / unit) * fee`, applied to the whole amount.
    PerUnit { unit: Decimal, fee: Decimal },
}

impl FeeRule {
    fn apply(&self, amount: Decimal) -> Decimal {
        match *self {
            FeeRule::Flat { fee } => fee,
            FeeRule::PerUnit { unit, fee } => (amount / unit).floor() * fee,
        }
    }
}

/// An amount range `(above, up_to]` for one wallet provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBracket {
    pub wallet: WalletName,
    /// Exclusive lower bound; `None` means unbounded.
    #[serde(default)]
    pub above: Option<Decimal>,
    /// Inclusive upper bound; `None` means unbounded.
    #[serde(default)]
    pub up_to: Option<Decimal>,
    pub rule: FeeRule,
}

impl FeeBracket {
    fn contains(&self, wallet: WalletName, amount: Decimal) -> bool {
        self.wallet == wallet
            && self.above.is_none_or(|above| amount > above)
            && self.up_to.is_none_or(|up_to| amount <= up_to)
    }
}

/// Fee and net payout for a requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub transaction_fee: Decimal,
    pub actual_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub min_withdraw_amount: Decimal,
    pub brackets: Vec<FeeBracket>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            min_withdraw_amount: dec!(50),
            brackets: default_brackets(),
        }
    }
}

/// The schedule currently charged by the payout desk.
pub fn default_brackets() -> Vec<FeeBracket> {
    vec![
        FeeBracket {
            wallet: WalletName::BKash,
            above: None,
            up_to: Some(dec!(1000)),
            rule: FeeRule::Flat { fee: dec!(5) },
        },
        FeeBracket {
            wallet: WalletName::BKash,
            above: Some(dec!(1000)),
            up_to: None,
            rule: FeeRule::Flat { fee: dec!(10) },
        },
        FeeBracket {
            wallet: WalletName::Nagad,
            above: None,
            up_to: Some(dec!(1000)),
            rule: FeeRule::Flat { fee: dec!(5) },
        },
        FeeBracket {
            wallet: WalletName::Nagad,
            above: Some(dec!(1000)),
            up_to: None,
            rule: FeeRule::PerUnit {
                unit: dec!(1000),
                fee: dec!(5),
            },
        },
    ]
}

impl FeeSchedule {
    pub fn new(min_withdraw_amount: Decimal, brackets: Vec<FeeBracket>) -> Self {
        Self {
            min_withdraw_amount,
            brackets,
        }
    }

    /// Computes the fee and net payout for withdrawing `amount` to `wallet`.
    ///
    /// Fails with a validation error below the minimum withdrawal amount and with
    /// `InvalidAmount` when no bracket applies or the payout would not be positive.
    pub fn compute_fee(&self, wallet: WalletName, amount: Decimal) -> Result<FeeQuote, PayoutError> {
        if amount < self.min_withdraw_amount {
            return Err(PayoutError::ValidationError(format!(
                "minimum withdrawal amount is {}",
                self.min_withdraw_amount.normalize()
            )));
        }

        let bracket = self
            .brackets
            .iter()
            .find(|bracket| bracket.contains(wallet, amount))
            .ok_or(PayoutError::InvalidAmount(amount))?;

        let transaction_fee = bracket.rule.apply(amount);
        let actual_amount = amount - transaction_fee;
        if transaction_fee < Decimal::ZERO || actual_amount <= Decimal::ZERO {
            return Err(PayoutError::InvalidAmount(amount));
        }

        Ok(FeeQuote {
            transaction_fee,
            actual_amount,
        })
    }
}
