//! Campaign-wide progress for administrators.
//!
//! A number belongs to its holder, or to its applicant while unheld; the
//! employee and department filters apply to that owner. Issue and token
//! lists filter on the reporting / token-holding employee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{EmployeeId, ReportedIssueId, ServiceResult, VerificationBatchId};
use crate::domains::verification::models::ReviewStatus;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilter {
    pub employee_id: Option<EmployeeId>,
    pub department_name: Option<String>,
}

impl StatusFilter {
    fn employee(&self) -> Option<String> {
        self.employee_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .filter(|id| !id.is_empty())
    }

    fn department(&self) -> Option<String> {
        self.department_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total_numbers: i64,
    pub confirmed: i64,
    pub reported: i64,
    pub pending: i64,
    pub unlisted_reported: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingToken {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub department: Option<String>,
    pub batch_id: VerificationBatchId,
    pub expires_at: DateTime<Utc>,
    pub has_submitted: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub id: ReportedIssueId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub phone: String,
    pub comment: Option<String>,
    pub purpose: Option<String>,
    pub review_status: ReviewStatus,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusReport {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub outstanding_tokens: Vec<OutstandingToken>,
    pub reported_issues: Vec<IssueSummary>,
    pub unlisted_numbers: Vec<IssueSummary>,
}

pub async fn get_status(
    filter: StatusFilter,
    deps: &ServerDeps,
) -> ServiceResult<VerificationStatusReport> {
    let pool = &deps.db_pool;
    let employee = filter.employee();
    let department = filter.department();

    let counts = sqlx::query_as::<_, StatusCounts>(
        r#"
        WITH eligible AS (
            SELECT n.id
            FROM mobile_numbers n
            JOIN employees e ON e.employee_id = COALESCE(n.current_holder_id, n.applicant_id)
            WHERE n.deleted_at IS NULL
              AND n.status <> 'deactivated'
              AND ($1::TEXT IS NULL OR e.employee_id = $1)
              AND ($2::TEXT IS NULL OR e.department = $2)
        ),
        latest AS (
            SELECT DISTINCT ON (l.mobile_number_id) l.mobile_number_id, l.action
            FROM verification_submission_logs l
            JOIN eligible ON eligible.id = l.mobile_number_id
            ORDER BY l.mobile_number_id, l.submitted_at DESC, l.seq DESC
        )
        SELECT
            COUNT(*) AS total_numbers,
            COUNT(*) FILTER (WHERE latest.action = 'confirm_usage') AS confirmed,
            COUNT(*) FILTER (WHERE latest.action = 'report_issue') AS reported,
            COUNT(*) FILTER (WHERE latest.action IS NULL) AS pending,
            (
                SELECT COUNT(DISTINCT i.reported_phone_number)
                FROM user_reported_issues i
                JOIN employees e ON e.employee_id = i.employee_id
                WHERE i.issue_kind = 'unlisted_number'
                  AND ($1::TEXT IS NULL OR e.employee_id = $1)
                  AND ($2::TEXT IS NULL OR e.department = $2)
            ) AS unlisted_reported
        FROM eligible
        LEFT JOIN latest ON latest.mobile_number_id = eligible.id
        "#,
    )
    .bind(&employee)
    .bind(&department)
    .fetch_one(pool)
    .await?;

    let outstanding_tokens = sqlx::query_as::<_, OutstandingToken>(
        r#"
        SELECT t.employee_id,
               e.name AS employee_name,
               e.department,
               t.batch_id,
               t.expires_at,
               EXISTS (
                   SELECT 1 FROM verification_submission_logs l WHERE l.token_id = t.id
               ) AS has_submitted
        FROM verification_tokens t
        JOIN employees e ON e.employee_id = t.employee_id
        WHERE t.status = 'pending'
          AND t.expires_at > NOW()
          AND ($1::TEXT IS NULL OR e.employee_id = $1)
          AND ($2::TEXT IS NULL OR e.department = $2)
        ORDER BY t.expires_at, t.employee_id
        "#,
    )
    .bind(&employee)
    .bind(&department)
    .fetch_all(pool)
    .await?;

    let reported_issues = sqlx::query_as::<_, IssueSummary>(
        r#"
        SELECT i.id,
               i.employee_id,
               e.name AS employee_name,
               n.phone,
               i.comment,
               i.purpose,
               i.review_status,
               i.updated_at AS reported_at
        FROM user_reported_issues i
        JOIN employees e ON e.employee_id = i.employee_id
        JOIN mobile_numbers n ON n.id = i.mobile_number_id
        WHERE i.issue_kind = 'number_issue'
          AND ($1::TEXT IS NULL OR e.employee_id = $1)
          AND ($2::TEXT IS NULL OR e.department = $2)
        ORDER BY i.updated_at DESC, i.id
        "#,
    )
    .bind(&employee)
    .bind(&department)
    .fetch_all(pool)
    .await?;

    let unlisted_numbers = sqlx::query_as::<_, IssueSummary>(
        r#"
        SELECT i.id,
               i.employee_id,
               e.name AS employee_name,
               i.reported_phone_number AS phone,
               i.comment,
               i.purpose,
               i.review_status,
               i.updated_at AS reported_at
        FROM user_reported_issues i
        JOIN employees e ON e.employee_id = i.employee_id
        WHERE i.issue_kind = 'unlisted_number'
          AND ($1::TEXT IS NULL OR e.employee_id = $1)
          AND ($2::TEXT IS NULL OR e.department = $2)
        ORDER BY i.updated_at DESC, i.id
        "#,
    )
    .bind(&employee)
    .bind(&department)
    .fetch_all(pool)
    .await?;

    Ok(VerificationStatusReport {
        counts,
        outstanding_tokens,
        reported_issues,
        unlisted_numbers,
    })
}
