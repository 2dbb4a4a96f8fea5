//! Verification campaigns: initiation, background runs and token expiry.

mod common;

use crate::common::*;
use number_registry::common::{EmployeeId, ServiceError, TokenRejection, VerificationBatchId};
use number_registry::domains::employees::activities::on_status_changed;
use number_registry::domains::employees::EmploymentStatus;
use number_registry::domains::verification::activities::{
    expire_stale_tokens, get_batch_status, get_info, initiate_verification, submit,
    InitiateVerificationInput, NumberAction, NumberActionKind, SubmitVerificationInput,
};
use number_registry::domains::verification::models::{
    generate_token_value, BatchStatus, ScopeKind, VerificationBatchTask, VerificationToken,
};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn test_initiate_validates_request(ctx: &TestHarness) {
    let employee = create_employee(&ctx.db_pool, None).await.unwrap();
    let ids = vec![employee.employee_id.as_str().to_string()];

    for duration_days in [0, 91] {
        let result = initiate_verification(
            InitiateVerificationInput {
                scope: ScopeKind::ByEmployeeIds,
                scope_values: ids.clone(),
                duration_days,
            },
            &ctx.deps,
        )
        .await;
        assert!(
            matches!(result, Err(ServiceError::Validation(_))),
            "duration {} should be rejected",
            duration_days
        );
    }

    let no_values = initiate_verification(
        InitiateVerificationInput {
            scope: ScopeKind::ByDepartment,
            scope_values: vec!["  ".to_string()],
            duration_days: 7,
        },
        &ctx.deps,
    )
    .await;
    assert!(matches!(no_values, Err(ServiceError::Validation(_))));

    let empty_department = unique_department();
    let nobody = initiate_verification(
        InitiateVerificationInput {
            scope: ScopeKind::ByDepartment,
            scope_values: vec![empty_department.clone()],
            duration_days: 7,
        },
        &ctx.deps,
    )
    .await;
    assert!(matches!(nobody, Err(ServiceError::Validation(_))));

    // A rejected request leaves no task behind
    let created: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM verification_batch_tasks WHERE $1 = ANY(scope_values)",
    )
    .bind(&empty_department)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(created, 0);

    let unknown = get_batch_status(VerificationBatchId::new(), &ctx.deps).await;
    assert!(matches!(unknown, Err(ServiceError::NotFound(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_initiate_returns_pending_batch_of_active_employees(ctx: &TestHarness) {
    let department = unique_department();
    let staying = create_employee(&ctx.db_pool, Some(&department)).await.unwrap();
    let leaving = create_employee(&ctx.db_pool, Some(&department)).await.unwrap();
    on_status_changed(&leaving.employee_id, EmploymentStatus::Departed, &ctx.deps)
        .await
        .unwrap();

    let batch = initiate_verification(
        InitiateVerificationInput {
            scope: ScopeKind::ByDepartment,
            scope_values: vec![department.clone(), format!(" {} ", department)],
            duration_days: 7,
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    assert_eq!(batch.status, BatchStatus::Pending);
    assert_eq!(batch.total_to_process, 1);
    assert_eq!(batch.tokens_generated, 0);
    assert_eq!(batch.scope_values, vec![department]);
    assert_eq!(batch.resolved_employee_ids(), vec![staying.employee_id]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_batch_issues_tokens_and_sends_links(ctx: &TestHarness) {
    let department = unique_department();
    let first = create_employee(&ctx.db_pool, Some(&department)).await.unwrap();
    let second = create_employee(&ctx.db_pool, Some(&department)).await.unwrap();

    let batch = initiate_verification(
        InitiateVerificationInput {
            scope: ScopeKind::ByDepartment,
            scope_values: vec![department],
            duration_days: 30,
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let done = run_until_finished(&ctx.deps, batch.id).await.unwrap();
    assert_eq!(done.status, BatchStatus::Completed);
    assert_eq!(done.total_to_process, 2);
    assert_eq!(done.tokens_generated, 2);
    assert_eq!(done.emails_attempted, 2);
    assert_eq!(done.emails_succeeded, 2);
    assert_eq!(done.emails_failed, 0);
    assert!(done.finished_at.is_some());

    for employee in [&first, &second] {
        let token = token_for(&ctx.db_pool, batch.id, &employee.employee_id)
            .await
            .unwrap();
        let address = employee.email.clone().unwrap();
        let sent = ctx.emails.sent_to(&address);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].employee_name, employee.name);
        assert_eq!(
            sent[0].link,
            format!("{}?token={}", VERIFICATION_BASE_URL, token)
        );

        let stored = VerificationToken::find_by_token(&token, &ctx.db_pool)
            .await
            .unwrap()
            .unwrap();
        let drift = stored.expires_at - stored.created_at - chrono::Duration::days(30);
        assert!(drift.num_seconds().abs() < 60, "unexpected lifetime drift {}", drift);
    }

    let status = get_batch_status(batch.id, &ctx.deps).await.unwrap();
    assert_eq!(status.status, BatchStatus::Completed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_failed_dispatches_are_counted_and_summarized(ctx: &TestHarness) {
    let reachable = create_employee(&ctx.db_pool, None).await.unwrap();

    let no_email_id = EmployeeId::new(format!("E{}", unique_suffix()));
    create_employee_with_email(&ctx.db_pool, &no_email_id, None, None)
        .await
        .unwrap();

    let bounce_id = EmployeeId::new(format!("E{}", unique_suffix()));
    let bounce_address = format!("{}{}", bounce_id, BOUNCE_DOMAIN);
    create_employee_with_email(&ctx.db_pool, &bounce_id, None, Some(&bounce_address))
        .await
        .unwrap();

    let slow_id = EmployeeId::new(format!("E{}", unique_suffix()));
    let slow_address = format!("{}{}", slow_id, SLOW_DOMAIN);
    create_employee_with_email(&ctx.db_pool, &slow_id, None, Some(&slow_address))
        .await
        .unwrap();

    let batch = initiate_for(
        &ctx.deps,
        &[&reachable.employee_id, &no_email_id, &bounce_id, &slow_id],
        14,
    )
    .await
    .unwrap();
    let done = run_until_finished(&ctx.deps, batch.id).await.unwrap();

    assert_eq!(done.status, BatchStatus::CompletedWithErrors);
    assert_eq!(done.tokens_generated, 4);
    assert_eq!(done.emails_attempted, 4);
    assert_eq!(done.emails_succeeded, 1);
    assert_eq!(done.emails_failed, 3);

    let summary = done.error_summary.unwrap();
    assert!(summary.contains(no_email_id.as_str()));
    assert!(summary.contains(bounce_id.as_str()));
    assert!(summary.contains(slow_id.as_str()));
    assert!(!summary.contains(reachable.employee_id.as_str()));

    // Every employee still gets a usable token
    let token = token_for(&ctx.db_pool, batch.id, &no_email_id).await.unwrap();
    let info = get_info(&token, &ctx.deps).await.unwrap();
    assert_eq!(info.employee.employee_id, no_email_id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_each_employee_gets_one_token_per_batch(ctx: &TestHarness) {
    let employee = create_employee(&ctx.db_pool, None).await.unwrap();

    let first = initiate_for(&ctx.deps, &[&employee.employee_id], 7).await.unwrap();
    let second = initiate_for(&ctx.deps, &[&employee.employee_id], 7).await.unwrap();
    run_until_finished(&ctx.deps, first.id).await.unwrap();
    run_until_finished(&ctx.deps, second.id).await.unwrap();

    let first_token = token_for(&ctx.db_pool, first.id, &employee.employee_id)
        .await
        .unwrap();
    let second_token = token_for(&ctx.db_pool, second.id, &employee.employee_id)
        .await
        .unwrap();
    assert_ne!(first_token, second_token);

    let issued = VerificationToken::find_by_batch(first.id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].employee_id, employee.employee_id);
    assert!(issued[0].dispatch_recorded_at.is_some());

    // Both campaigns' links stay usable side by side
    get_info(&first_token, &ctx.deps).await.unwrap();
    get_info(&second_token, &ctx.deps).await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_expired_tokens_are_refused_and_swept(ctx: &TestHarness) {
    let employee = create_employee(&ctx.db_pool, None).await.unwrap();
    let token = issue_token(&ctx.deps, &employee.employee_id).await.unwrap();

    sqlx::query(
        "UPDATE verification_tokens SET expires_at = NOW() - INTERVAL '1 minute' WHERE token = $1",
    )
    .bind(&token)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let refused = get_info(&token, &ctx.deps).await;
    assert!(matches!(
        refused,
        Err(ServiceError::InvalidLink(TokenRejection::Expired))
    ));

    let swept = expire_stale_tokens(&ctx.db_pool).await.unwrap();
    assert!(swept >= 1);

    let status: String =
        sqlx::query_scalar("SELECT status::TEXT FROM verification_tokens WHERE token = $1")
            .bind(&token)
            .fetch_one(&ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(status, "expired");

    let still_refused = get_info(&token, &ctx.deps).await;
    assert!(matches!(still_refused, Err(ServiceError::InvalidLink(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_expired_token_cannot_submit(ctx: &TestHarness) {
    let applicant = create_employee(&ctx.db_pool, None).await.unwrap();
    let holder = create_employee(&ctx.db_pool, None).await.unwrap();
    let number = create_held_number(&ctx.deps, &applicant.employee_id, &holder.employee_id)
        .await
        .unwrap();
    let token = issue_token(&ctx.deps, &holder.employee_id).await.unwrap();

    sqlx::query(
        "UPDATE verification_tokens SET expires_at = NOW() - INTERVAL '1 minute' WHERE token = $1",
    )
    .bind(&token)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let refused = submit(
        &token,
        SubmitVerificationInput {
            actions: vec![NumberAction {
                phone: number.phone.clone(),
                action: NumberActionKind::ReportIssue,
                purpose: None,
                comment: Some("not mine".to_string()),
            }],
            unlisted_numbers: Vec::new(),
        },
        &ctx.deps,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        refused,
        ServiceError::InvalidLink(TokenRejection::Expired)
    ));
    assert!(!refused.to_string().contains(holder.employee_id.as_str()));
    assert!(!refused.to_string().contains(&number.phone));

    let unchanged = number_registry::domains::numbers::activities::get_number(
        &number.phone,
        &ctx.deps,
    )
    .await
    .unwrap();
    assert_eq!(unchanged.status, number.status);

    let logged: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM verification_submission_logs l
        JOIN verification_tokens t ON t.id = l.token_id
        WHERE t.token = $1
        "#,
    )
    .bind(&token)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(logged, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_resumed_batch_counts_undispatched_token_as_failed(ctx: &TestHarness) {
    let interrupted = create_employee(&ctx.db_pool, None).await.unwrap();
    let remaining = create_employee(&ctx.db_pool, None).await.unwrap();
    let ids = vec![interrupted.employee_id.clone(), remaining.employee_id.clone()];

    // State left by a run that issued the first token and stopped before
    // its email outcome was recorded. Committed together so no runner sees
    // the batch without the token.
    let mut tx = ctx.db_pool.begin().await.unwrap();
    let batch = VerificationBatchTask::create(
        ScopeKind::ByEmployeeIds,
        &ids.iter().map(|id| id.as_str().to_string()).collect::<Vec<_>>(),
        &ids,
        7,
        &mut *tx,
    )
    .await
    .unwrap();
    let earlier = VerificationToken::insert(
        batch.id,
        &interrupted.employee_id,
        &generate_token_value(),
        chrono::Utc::now() + chrono::Duration::days(7),
        &mut *tx,
    )
    .await
    .unwrap();
    VerificationBatchTask::record_token_generated(batch.id, &mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let done = run_until_finished(&ctx.deps, batch.id).await.unwrap();
    assert_eq!(done.status, BatchStatus::CompletedWithErrors);
    assert_eq!(done.tokens_generated, 2);
    assert_eq!(done.emails_attempted, 2);
    assert_eq!(done.emails_succeeded, 1);
    assert_eq!(done.emails_failed, 1);
    let summary = done.error_summary.unwrap();
    assert!(summary.contains(interrupted.employee_id.as_str()));
    assert!(summary.contains("interrupted before dispatch"));

    // The interrupted employee is not mailed again; the rest are
    let interrupted_address = interrupted.email.clone().unwrap();
    assert!(ctx.emails.sent_to(&interrupted_address).is_empty());
    let remaining_address = remaining.email.clone().unwrap();
    assert_eq!(ctx.emails.sent_to(&remaining_address).len(), 1);

    // The earlier token is the one kept, and it still works
    let tokens = VerificationToken::find_by_batch(batch.id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(|t| t.dispatch_recorded_at.is_some()));
    get_info(&earlier.token, &ctx.deps).await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_batch_fails_after_exhausting_leases(ctx: &TestHarness) {
    let employee = create_employee(&ctx.db_pool, None).await.unwrap();
    let ids = vec![employee.employee_id.clone()];

    // Lapse the lease and abandon inside one transaction so no other
    // runner reclaims the task in between.
    let mut tx = ctx.db_pool.begin().await.unwrap();
    let batch = VerificationBatchTask::create(
        ScopeKind::ByEmployeeIds,
        &[employee.employee_id.as_str().to_string()],
        &ids,
        7,
        &mut *tx,
    )
    .await
    .unwrap();
    sqlx::query(
        r#"
        UPDATE verification_batch_tasks
        SET status = 'in_progress',
            worker_id = 'crashed-runner',
            attempts = 3,
            lease_expires_at = NOW() - INTERVAL '1 minute'
        WHERE id = $1
        "#,
    )
    .bind(batch.id)
    .execute(&mut *tx)
    .await
    .unwrap();
    let abandoned = VerificationBatchTask::abandon_exhausted(3, &mut *tx)
        .await
        .unwrap();
    assert!(abandoned >= 1);
    tx.commit().await.unwrap();

    let failed = get_batch_status(batch.id, &ctx.deps).await.unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert!(failed.finished_at.is_some());
    assert!(failed
        .error_summary
        .unwrap()
        .contains("abandoned after 3 attempts"));
    assert!(ctx.emails.sent_to(&employee.email.clone().unwrap()).is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_failed_batch_is_not_reopened(ctx: &TestHarness) {
    let employee = create_employee(&ctx.db_pool, None).await.unwrap();
    let ids = vec![employee.employee_id.clone()];

    let mut tx = ctx.db_pool.begin().await.unwrap();
    let batch = VerificationBatchTask::create(
        ScopeKind::ByEmployeeIds,
        &[employee.employee_id.as_str().to_string()],
        &ids,
        7,
        &mut *tx,
    )
    .await
    .unwrap();
    VerificationBatchTask::mark_failed(batch.id, "failed to load employees: gone", &mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let failed = get_batch_status(batch.id, &ctx.deps).await.unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(
        failed.error_summary.as_deref(),
        Some("failed to load employees: gone")
    );

    // Neither a runner nor a late finish picks it back up
    let finished = VerificationBatchTask::finish(
        batch.id,
        "any-runner",
        BatchStatus::Completed,
        &ctx.db_pool,
    )
    .await
    .unwrap();
    assert!(finished.is_none());
    let after = run_until_finished(&ctx.deps, batch.id).await.unwrap();
    assert_eq!(after.status, BatchStatus::Failed);
    assert_eq!(after.tokens_generated, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_unknown_token_is_indistinguishable_from_expired(ctx: &TestHarness) {
    let missing = get_info("no-such-token", &ctx.deps).await.unwrap_err();
    let blank = get_info("   ", &ctx.deps).await.unwrap_err();

    assert_eq!(missing.status_code(), blank.status_code());
    assert_eq!(missing.kind(), "invalid_link");
    assert_eq!(missing.to_string(), blank.to_string());
}
