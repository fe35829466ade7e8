use crate::domain::fee::{FeeBracket, FeeSchedule, default_brackets};
use crate::error::{PayoutError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime settings of the payout desk.
///
/// Every field has a default, so a JSON config file only needs the keys it wants
/// to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_withdraw_amount: Decimal,
    pub otp_ttl_secs: u64,
    pub otp_digits: usize,
    /// Wrong codes a single challenge tolerates before it is burned.
    pub otp_max_attempts: u32,
    pub page_sizes: Vec<u32>,
    pub default_page_size: u32,
    pub fee_brackets: Vec<FeeBracket>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_withdraw_amount: dec!(50),
            otp_ttl_secs: 120,
            otp_digits: 6,
            otp_max_attempts: 5,
            page_sizes: vec![5, 10, 20, 50],
            default_page_size: 10,
            fee_brackets: default_brackets(),
        }
    }
}

impl Config {
    /// Reads a JSON config file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_withdraw_amount <= Decimal::ZERO {
            return Err(PayoutError::ValidationError(
                "min_withdraw_amount must be positive".to_string(),
            ));
        }
        if self.otp_digits == 0 || self.otp_ttl_secs == 0 || self.otp_max_attempts == 0 {
            return Err(PayoutError::ValidationError(
                "otp_digits, otp_ttl_secs and otp_max_attempts must be positive".to_string(),
            ));
        }
        if !self.page_sizes.contains(&self.default_page_size) {
            return Err(PayoutError::ValidationError(format!(
                "default_page_size {} is not one of {:?}",
                self.default_page_size, self.page_sizes
            )));
        }
        Ok(())
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.min_withdraw_amount, self.fee_brackets.clone())
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.otp_ttl_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.fee_schedule(), FeeSchedule::default());
        assert_eq!(config.otp_ttl(), chrono::Duration::seconds(120));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "min_withdraw_amount": "100", "default_page_size": 20 }}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.min_withdraw_amount, dec!(100));
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.otp_digits, 6);
        assert_eq!(config.otp_max_attempts, 5);
        assert_eq!(config.fee_brackets.len(), 4);
    }

    #[test]
    fn test_unknown_default_page_size_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "default_page_size": 7 }}"#).unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(PayoutError::ValidationError(_))
        ));
    }
}
