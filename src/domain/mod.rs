//! Domain model: entities, value objects and the ports the application layer
//! drives.

pub mod account;
pub mod cart;
pub mod fee;
pub mod otp;
pub mod ports;
pub mod query;
pub mod session;
pub mod wallet;
pub mod withdrawal;
