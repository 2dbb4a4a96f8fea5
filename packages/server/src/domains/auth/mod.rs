//! Auth domain - bearer token verification and revocation.
//!
//! Responsibilities:
//! - Verifying HS256 JWTs presented by operators
//! - Revoking tokens on logout (persisted, survives restarts)

pub mod jwt;
pub mod revocation;

pub use jwt::{Claims, JwtService};
pub use revocation::{PostgresRevocationStore, TokenRevocationStore};
