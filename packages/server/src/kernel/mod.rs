//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod email;
pub mod jobs;
pub mod scheduled_tasks;
pub mod traits;

pub use deps::ServerDeps;
pub use email::{HttpEmailSender, LogEmailSender};
pub use traits::*;
