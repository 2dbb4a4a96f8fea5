//! Number lifecycle: creation, possession, risk handling and history.
//!
//! Leaf domain. Verification reads and stamps numbers but nothing here
//! depends on it.

pub mod activities;
pub mod models;

pub use models::{MobileNumber, NumberStatus};
