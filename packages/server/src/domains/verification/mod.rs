//! Verification campaigns.
//!
//! - Batch orchestration: scope resolution, queued batch tasks, token issue
//!   and email dispatch (`activities::initiate`, `activities::batch`)
//! - Submission processing behind per-employee tokens
//!   (`activities::submission`)
//! - Read-only admin aggregation (`activities::admin_status`)
//! - Issue review (`activities::issues`)

pub mod activities;
pub mod models;
pub mod queue;

pub use queue::BatchTaskQueue;
