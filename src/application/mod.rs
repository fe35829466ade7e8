//! Application layer orchestrating the domain through its ports.
//!
//! `WalletRegistry` owns OTP-gated wallet registration, `WithdrawalLifecycle`
//! drives the withdrawal state machine and its balance reservations, and
//! `AdminReviewQueue` is the paginated admin view that settles requests.

pub mod review_queue;
pub mod wallet_registry;
pub mod withdrawal;
