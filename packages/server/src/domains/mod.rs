// Business domains
pub mod auth;
pub mod employees;
pub mod numbers;
pub mod verification;
