// Common types and utilities shared across the application

pub mod entity_ids;
pub mod error;
pub mod id;
pub mod types;

pub use entity_ids::*;
pub use error::{is_unique_violation, ServiceError, ServiceResult, TokenRejection};
pub use types::*;
