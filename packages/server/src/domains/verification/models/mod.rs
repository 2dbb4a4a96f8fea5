pub mod batch_task;
pub mod reported_issue;
pub mod submission_log;
pub mod token;

pub use batch_task::{
    BatchStatus, QueueDepth, ScopeKind, VerificationBatchTask, ERROR_SUMMARY_LIMIT,
};
pub use reported_issue::{IssueKind, ReportedIssue, ReviewStatus};
pub use submission_log::{LatestAction, SubmissionAction, SubmissionLog};
pub use token::{generate_token_value, TokenStatus, VerificationToken, TOKEN_BYTES};
