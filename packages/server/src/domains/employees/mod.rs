//! Employee collaborator.
//!
//! Employee records are owned by HR; this domain covers what the number
//! registry needs from them: lookup, campaign scope resolution and the
//! status-changed hook that drives risk flagging.

pub mod activities;
pub mod models;

pub use models::{Employee, EmployeeScope, EmploymentStatus};
