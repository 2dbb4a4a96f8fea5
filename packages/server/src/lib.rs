// Number Registry - company phone number lifecycle and verification campaigns
//
// Tracks which employee holds which company-issued number and runs periodic
// campaigns asking employees to confirm or dispute their assignments.
// Business logic lives in domains/*/activities; kernel/ holds infrastructure.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
