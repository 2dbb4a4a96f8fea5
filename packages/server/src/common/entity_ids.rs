//! Typed ID definitions for all domain entities.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::id::Id;

pub struct MobileNumber;
pub struct UsageRecord;
pub struct ApplicantChange;
pub struct VerificationBatch;
pub struct VerificationToken;
pub struct ReportedIssue;
pub struct SubmissionLogEntry;

pub type MobileNumberId = Id<MobileNumber>;
pub type UsageRecordId = Id<UsageRecord>;
pub type ApplicantChangeId = Id<ApplicantChange>;
pub type VerificationBatchId = Id<VerificationBatch>;
pub type VerificationTokenId = Id<VerificationToken>;
pub type ReportedIssueId = Id<ReportedIssue>;
pub type SubmissionLogId = Id<SubmissionLogEntry>;

/// Business identifier of an employee, assigned by the HR system.
///
/// Unlike the ids above this is not allocated here: it arrives from the
/// employee collaborator and is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmployeeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EmployeeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_id_is_trimmed() {
        assert_eq!(EmployeeId::new("  E1001 ").as_str(), "E1001");
    }

    #[test]
    fn test_employee_id_serializes_as_string() {
        let json = serde_json::to_string(&EmployeeId::from("E7")).unwrap();
        assert_eq!(json, "\"E7\"");
    }
}
