//! HTTP surface: auth gating, status codes and JSON shapes.

mod common;

use crate::common::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use number_registry::common::EmployeeId;
use number_registry::server::build_router;
use serde_json::{json, Value};
use test_context::test_context;
use tower::ServiceExt;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn operator_token(ctx: &TestHarness, operator: &EmployeeId) -> String {
    ctx.jwt_service().create_token(operator, true).unwrap()
}

fn staff_token(ctx: &TestHarness, staff: &EmployeeId) -> String {
    ctx.jwt_service().create_token(staff, false).unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_health_reports_database_and_batch_queue(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["ok"], true);
    assert!(body["batch_queue"]["pending"].as_i64().unwrap() >= 0);
    assert!(body["batch_queue"]["stalled"].is_i64());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_admin_routes_require_valid_bearer(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);

    let (status, body) = send(&app, Method::GET, "/mobilenumbers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(
        &app,
        Method::GET,
        "/verification/admin/status",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_number_crud_over_http(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);
    let operator = create_employee(&ctx.db_pool, None).await.unwrap();
    let holder = create_employee(&ctx.db_pool, None).await.unwrap();
    let token = operator_token(ctx, &operator.employee_id);
    let phone = unique_phone();

    let (status, created) = send(
        &app,
        Method::POST,
        "/mobilenumbers",
        Some(&token),
        Some(json!({
            "phone": phone,
            "applicantId": operator.employee_id.as_str(),
            "purpose": "warehouse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["phone"], phone.as_str());
    assert_eq!(created["status"], "idle");
    assert!(created.get("deletedAt").is_none());

    let (status, duplicate) = send(
        &app,
        Method::POST,
        "/mobilenumbers",
        Some(&token),
        Some(json!({ "phone": phone, "applicantId": operator.employee_id.as_str() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(duplicate["error"], "conflict");

    let (status, assigned) = send(
        &app,
        Method::POST,
        &format!("/mobilenumbers/{}/assign", phone),
        Some(&token),
        Some(json!({ "employeeId": holder.employee_id.as_str(), "date": "2025-05-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["status"], "in_use");
    assert_eq!(assigned["currentHolderId"], holder.employee_id.as_str());

    let (status, history) = send(
        &app,
        Method::GET,
        &format!("/mobilenumbers/{}/history", phone),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["usage"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/mobilenumbers/{}/unassign", phone),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!(
            "/mobilenumbers?applicantId={}&sort=phone&order=desc",
            operator.employee_id
        ),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/mobilenumbers/{}", phone),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, missing) = send(
        &app,
        Method::GET,
        &format!("/mobilenumbers/{}", phone),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"], "not_found");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_verification_link_flow_over_http(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);
    let operator = create_employee(&ctx.db_pool, None).await.unwrap();
    let holder = create_employee(&ctx.db_pool, None).await.unwrap();
    let number = create_held_number(&ctx.deps, &operator.employee_id, &holder.employee_id)
        .await
        .unwrap();
    let admin = operator_token(ctx, &operator.employee_id);

    let (status, initiated) = send(
        &app,
        Method::POST,
        "/verification/initiate",
        Some(&admin),
        Some(json!({
            "scope": "byEmployeeIds",
            "scopeValues": [holder.employee_id.as_str()],
            "durationDays": 7,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(initiated["status"], "pending");
    assert_eq!(initiated["totalToProcess"], 1);

    let batch_id: number_registry::common::VerificationBatchId =
        serde_json::from_value(initiated["batchId"].clone()).unwrap();
    run_until_finished(&ctx.deps, batch_id).await.unwrap();

    let (status, batch) = send(
        &app,
        Method::GET,
        &format!("/verification/batch/{}", batch_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["status"], "completed");
    assert!(batch.get("employeeIds").is_none());

    let link_token = token_for(&ctx.db_pool, batch_id, &holder.employee_id)
        .await
        .unwrap();

    let (status, info) = send(
        &app,
        Method::GET,
        &format!("/verification/info?token={}", link_token),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["numbers"][0]["phone"], number.phone.as_str());
    assert_eq!(info["numbers"][0]["verification"], "pending");

    let (status, receipt) = send(
        &app,
        Method::POST,
        &format!("/verification/submit?token={}", link_token),
        None,
        Some(json!({
            "actions": [{ "phone": number.phone, "action": "confirm_usage" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["confirmed"], 1);

    for uri in ["/verification/info?token=bogus", "/verification/info"] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "invalid_link");
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_logout_revokes_bearer(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);
    let operator = create_employee(&ctx.db_pool, None).await.unwrap();
    let token = operator_token(ctx, &operator.employee_id);

    let (status, _) = send(&app, Method::GET, "/verification/batches", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/verification/batches", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_campaign_routes_require_admin(ctx: &TestHarness) {
    let app = build_router(ctx.app_state(), false);
    let admin = create_employee(&ctx.db_pool, None).await.unwrap();
    let staff = create_employee(&ctx.db_pool, None).await.unwrap();
    let admin_token = operator_token(ctx, &admin.employee_id);
    let staff_token = staff_token(ctx, &staff.employee_id);
    let initiate = json!({
        "scope": "byEmployeeIds",
        "scopeValues": [staff.employee_id.as_str()],
        "durationDays": 7,
    });

    let (status, body) = send(
        &app,
        Method::POST,
        "/verification/initiate",
        Some(&staff_token),
        Some(initiate.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    for (method, uri) in [
        (Method::GET, "/verification/admin/status".to_string()),
        (Method::GET, "/verification/batches".to_string()),
        (
            Method::POST,
            format!(
                "/verification/issues/{}/resolve",
                number_registry::common::ReportedIssueId::new()
            ),
        ),
    ] {
        let body = (method == Method::POST).then(|| json!({ "status": "resolved" }));
        let (status, _) = send(&app, method, &uri, Some(&staff_token), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} should be admin only", uri);
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/verification/initiate",
        None,
        Some(initiate.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Staff keep the number registry
    let (status, _) = send(&app, Method::GET, "/mobilenumbers", Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/verification/admin/status?employeeId={}", staff.employee_id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
