//! Background task infrastructure.
//!
//! - [`TaskQueue`] - claimable, leased work items (implemented by domains)
//! - [`TaskRunner`] - bounded worker that claims and runs tasks
//! - [`TaskHandler`] - domain logic for one task
//!
//! Business logic stays in domains; this module only schedules it.

mod queue;
mod runner;

pub use queue::{ClaimedTask, TaskQueue};
pub use runner::{ShutdownHandle, TaskHandler, TaskRunner, TaskRunnerConfig};
