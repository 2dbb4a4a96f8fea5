use serde::Deserialize;
use tracing::info;

use crate::common::{clean_text, EmployeeId, ReportedIssueId, ServiceError, ServiceResult};
use crate::domains::employees::activities::require_active_employee;
use crate::domains::verification::models::{ReportedIssue, ReviewStatus};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIssueInput {
    pub status: ReviewStatus,
    pub remarks: Option<String>,
}

/// Close a pending issue. Once closed, the same employee can report the
/// same number or phone again.
pub async fn resolve_issue(
    issue_id: ReportedIssueId,
    input: ResolveIssueInput,
    operator_id: &EmployeeId,
    deps: &ServerDeps,
) -> ServiceResult<ReportedIssue> {
    if input.status == ReviewStatus::Pending {
        return Err(ServiceError::validation(
            "an issue can only be resolved or dismissed",
        ));
    }

    let mut tx = deps.db_pool.begin().await?;

    let issue = ReportedIssue::lock_by_id(issue_id, &mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("issue {}", issue_id)))?;

    if issue.review_status != ReviewStatus::Pending {
        return Err(ServiceError::invalid_state(format!(
            "issue {} is already {:?}",
            issue_id, issue.review_status
        )));
    }

    require_active_employee(operator_id, &mut tx).await?;

    let remarks = clean_text(input.remarks);
    let issue = ReportedIssue::close(
        issue_id,
        input.status,
        remarks.as_deref(),
        operator_id,
        &mut *tx,
    )
    .await?;
    tx.commit().await?;

    info!(
        issue_id = %issue.id,
        status = ?issue.review_status,
        operator = %operator_id,
        "reported issue closed"
    );
    Ok(issue)
}
