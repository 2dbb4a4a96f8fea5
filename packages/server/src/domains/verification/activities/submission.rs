//! Employee-facing side of a verification campaign.
//!
//! Callers present only a token. Unknown and expired tokens are rejected
//! identically and nothing about the employee is revealed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use tracing::{debug, info};

use crate::common::{
    clean_text, normalize_phone, EmployeeId, MobileNumberId, ServiceError, ServiceResult,
    TokenRejection,
};
use crate::domains::employees::Employee;
use crate::domains::numbers::models::{MobileNumber, NumberStatus};
use crate::domains::verification::models::{
    ReportedIssue, ReviewStatus, SubmissionAction, SubmissionLog, VerificationToken,
};
use crate::kernel::ServerDeps;

/// Where a held number stands under the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberVerificationState {
    Pending,
    Confirmed,
    Reported,
}

impl NumberVerificationState {
    pub fn from_latest(latest: Option<SubmissionAction>) -> Self {
        match latest {
            Some(SubmissionAction::ConfirmUsage) => Self::Confirmed,
            Some(SubmissionAction::ReportIssue) => Self::Reported,
            Some(SubmissionAction::ReportUnlisted) | None => Self::Pending,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub employee_id: EmployeeId,
    pub name: String,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldNumber {
    pub phone: String,
    pub status: NumberStatus,
    pub purpose: Option<String>,
    pub vendor: Option<String>,
    pub last_confirmed_at: Option<DateTime<Utc>>,
    pub verification: NumberVerificationState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlistedReport {
    pub phone: String,
    pub purpose: Option<String>,
    pub comment: Option<String>,
    pub review_status: ReviewStatus,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInfo {
    pub employee: EmployeeSummary,
    pub expires_at: DateTime<Utc>,
    pub numbers: Vec<HeldNumber>,
    pub unlisted_reports: Vec<UnlistedReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberActionKind {
    ConfirmUsage,
    ReportIssue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberAction {
    pub phone: String,
    pub action: NumberActionKind,
    pub purpose: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlistedNumberInput {
    pub phone: String,
    pub purpose: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationInput {
    #[serde(default)]
    pub actions: Vec<NumberAction>,
    #[serde(default)]
    pub unlisted_numbers: Vec<UnlistedNumberInput>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub confirmed: usize,
    pub reported: usize,
    pub unlisted: usize,
}

/// Look up a token and check it can still be used.
async fn load_usable_token<'e>(
    token: &str,
    executor: impl PgExecutor<'e>,
) -> ServiceResult<VerificationToken> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ServiceError::InvalidLink(TokenRejection::NotFound));
    }

    let found = VerificationToken::find_by_token(token, executor)
        .await?
        .ok_or(ServiceError::InvalidLink(TokenRejection::NotFound))?;

    found.check_usable(Utc::now()).map_err(|rejection| {
        debug!(token_id = %found.id, ?rejection, "verification token refused");
        ServiceError::InvalidLink(rejection)
    })?;

    Ok(found)
}

/// What the employee sees when opening their link.
pub async fn get_info(token: &str, deps: &ServerDeps) -> ServiceResult<VerificationInfo> {
    let pool = &deps.db_pool;
    let token = load_usable_token(token, pool).await?;

    let employee = Employee::find_by_id(&token.employee_id, pool)
        .await?
        .ok_or(ServiceError::InvalidLink(TokenRejection::NotFound))?;

    let latest: HashMap<MobileNumberId, SubmissionAction> =
        SubmissionLog::latest_for_token(token.id, pool)
            .await?
            .into_iter()
            .map(|l| (l.mobile_number_id, l.action))
            .collect();

    let numbers = MobileNumber::find_held_by(&employee.employee_id, pool)
        .await?
        .into_iter()
        .map(|n| HeldNumber {
            verification: NumberVerificationState::from_latest(latest.get(&n.id).copied()),
            phone: n.phone,
            status: n.status,
            purpose: n.purpose,
            vendor: n.vendor,
            last_confirmed_at: n.last_confirmed_at,
        })
        .collect();

    let unlisted_reports = ReportedIssue::unlisted_for_token(token.id, pool)
        .await?
        .into_iter()
        .filter_map(|issue| {
            Some(UnlistedReport {
                phone: issue.reported_phone_number?,
                purpose: issue.purpose,
                comment: issue.comment,
                review_status: issue.review_status,
                reported_at: issue.updated_at,
            })
        })
        .collect();

    Ok(VerificationInfo {
        employee: EmployeeSummary {
            employee_id: employee.employee_id,
            name: employee.name,
            department: employee.department,
        },
        expires_at: token.expires_at,
        numbers,
        unlisted_reports,
    })
}

/// Record an employee's answers. Everything commits together or not at
/// all; the token stays usable afterwards.
pub async fn submit(
    token: &str,
    input: SubmitVerificationInput,
    deps: &ServerDeps,
) -> ServiceResult<SubmissionReceipt> {
    if input.actions.is_empty() && input.unlisted_numbers.is_empty() {
        return Err(ServiceError::validation(
            "submission must contain at least one action or unlisted number",
        ));
    }

    let mut tx = deps.db_pool.begin().await?;
    let token = load_usable_token(token, &mut *tx).await?;
    let employee_id = token.employee_id.clone();

    let unlisted: Vec<(String, UnlistedNumberInput)> = input
        .unlisted_numbers
        .into_iter()
        .map(|report| Ok((normalize_phone(&report.phone)?, report)))
        .collect::<ServiceResult<_>>()?;

    let held: HashMap<String, MobileNumber> = MobileNumber::find_held_by(&employee_id, &mut *tx)
        .await?
        .into_iter()
        .map(|n| (n.phone.clone(), n))
        .collect();

    let mut receipt = SubmissionReceipt::default();

    for action in input.actions {
        let phone = action.phone.trim();
        let number = held.get(phone).ok_or_else(|| {
            ServiceError::validation(format!("number {} is not currently assigned to you", phone))
        })?;
        let purpose = clean_text(action.purpose);
        let comment = clean_text(action.comment);

        let logged = match action.action {
            NumberActionKind::ConfirmUsage => {
                MobileNumber::record_confirmation(number.id, purpose.as_deref(), &mut *tx).await?;
                receipt.confirmed += 1;
                SubmissionAction::ConfirmUsage
            }
            NumberActionKind::ReportIssue => {
                MobileNumber::mark_user_reported(number.id, &mut *tx).await?;
                ReportedIssue::upsert_number_issue(
                    token.id,
                    &employee_id,
                    number.id,
                    comment.as_deref(),
                    purpose.as_deref(),
                    &mut *tx,
                )
                .await?;
                receipt.reported += 1;
                SubmissionAction::ReportIssue
            }
        };

        SubmissionLog::append(
            &employee_id,
            token.id,
            Some(number.id),
            &number.phone,
            logged,
            purpose.as_deref(),
            comment.as_deref(),
            &mut *tx,
        )
        .await?;
    }

    for (phone, report) in unlisted {
        let purpose = clean_text(report.purpose);
        let comment = clean_text(report.comment);

        ReportedIssue::upsert_unlisted(
            token.id,
            &employee_id,
            &phone,
            comment.as_deref(),
            purpose.as_deref(),
            &mut *tx,
        )
        .await?;
        SubmissionLog::append(
            &employee_id,
            token.id,
            None,
            &phone,
            SubmissionAction::ReportUnlisted,
            purpose.as_deref(),
            comment.as_deref(),
            &mut *tx,
        )
        .await?;
        receipt.unlisted += 1;
    }

    tx.commit().await?;

    info!(
        employee_id = %employee_id,
        token_id = %token.id,
        confirmed = receipt.confirmed,
        reported = receipt.reported,
        unlisted = receipt.unlisted,
        "verification submitted"
    );
    Ok(receipt)
}
