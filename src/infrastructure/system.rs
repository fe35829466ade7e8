//! Adapters for the process environment: wall clock, OTP code generation and SMS
//! delivery.

use crate::domain::ports::{Clock, OtpGenerator, SmsGateway};
use crate::domain::wallet::PhoneNumber;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a settable instant, for replays and tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self, digits: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..digits)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

/// Always issues the same code. Only meant for development replays.
#[derive(Debug, Clone)]
pub struct FixedOtpGenerator {
    code: String,
}

impl FixedOtpGenerator {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl OtpGenerator for FixedOtpGenerator {
    fn generate(&self, _digits: usize) -> String {
        self.code.clone()
    }
}

/// Development gateway: writes the code to the log instead of sending an SMS.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSmsGateway;

#[async_trait]
impl SmsGateway for LoggingSmsGateway {
    async fn send_otp(&self, phone: &PhoneNumber, code: &str) -> Result<()> {
        info!(phone = %phone, code, "OTP dispatched");
        Ok(())
    }
}

/// Keeps every dispatched code so tests can read them back.
#[derive(Debug, Default, Clone)]
pub struct RecordingSmsGateway {
    sent: Arc<tokio::sync::Mutex<Vec<(PhoneNumber, String)>>>,
}

impl RecordingSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(PhoneNumber, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn last_code_for(&self, phone: &PhoneNumber) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl SmsGateway for RecordingSmsGateway {
    async fn send_otp(&self, phone: &PhoneNumber, code: &str) -> Result<()> {
        self.sent.lock().await.push((phone.clone(), code.to_string()));
        Ok(())
    }
}
