// HTTP routes
pub mod auth;
pub mod employees;
pub mod health;
pub mod numbers;
pub mod verification;

pub use auth::*;
pub use employees::*;
pub use health::*;
pub use numbers::*;
pub use verification::*;
