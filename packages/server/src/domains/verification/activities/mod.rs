pub mod admin_status;
pub mod batch;
pub mod initiate;
pub mod issues;
pub mod maintenance;
pub mod submission;

pub use admin_status::{get_status, StatusFilter, VerificationStatusReport};
pub use batch::{run_batch_task, VerificationBatchHandler};
pub use initiate::{
    get_batch_status, initiate_verification, list_batches, resolve_scope,
    InitiateVerificationInput,
};
pub use issues::{resolve_issue, ResolveIssueInput};
pub use maintenance::expire_stale_tokens;
pub use submission::{
    get_info, submit, NumberAction, NumberActionKind, SubmissionReceipt, SubmitVerificationInput,
    UnlistedNumberInput, VerificationInfo,
};
