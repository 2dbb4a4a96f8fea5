// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Naming convention: Base* for trait names (e.g., BaseEmailSender)

use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Email Trait (Infrastructure - outbound verification mail)
// =============================================================================

#[async_trait]
pub trait BaseEmailSender: Send + Sync {
    /// Deliver the verification link to one employee.
    ///
    /// An `Err` means the message was not accepted by the transport; the
    /// caller records it as a failed dispatch.
    async fn send_verification_email(
        &self,
        to_address: &str,
        employee_name: &str,
        verification_link: &str,
    ) -> Result<()>;
}
