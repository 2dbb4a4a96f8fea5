use crate::common::{EmployeeId, ServiceError};
use crate::domains::auth::{Claims, JwtService, TokenRevocationStore};
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

/// Authenticated operator from a verified, unrevoked JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub employee_id: EmployeeId,
    pub is_admin: bool,
    /// JWT id, used to revoke this credential on logout
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            employee_id: claims.employee_id,
            is_admin: claims.is_admin,
            token_id: claims.jti,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        }
    }
}

/// JWT authentication middleware
///
/// Verifies the bearer token and adds AuthUser to request extensions.
/// Missing, invalid or revoked tokens leave the request anonymous; routes
/// that need an operator are wrapped in [`require_auth`]. A failed
/// revocation lookup also leaves the request anonymous.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    revocations: Arc<dyn TokenRevocationStore>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(claims) = bearer_claims(&request, &jwt_service) {
        match revocations.is_revoked(&claims.jti).await {
            Ok(false) => {
                let user = AuthUser::from(claims);
                debug!(
                    "Authenticated operator: {} (admin: {})",
                    user.employee_id, user.is_admin
                );
                request.extensions_mut().insert(user);
            }
            Ok(true) => debug!("Rejected revoked token {}", claims.jti),
            Err(e) => error!(error = %e, "Revocation lookup failed; treating request as anonymous"),
        }
    } else {
        debug!("No valid authentication token");
    }

    next.run(request).await
}

/// Reject requests that the JWT middleware left anonymous.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthUser>().is_none() {
        return ServiceError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Reject anonymous requests and operators without the admin claim.
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthUser>() {
        None => ServiceError::Unauthorized.into_response(),
        Some(user) if !user.is_admin => {
            debug!("Operator {} denied admin route", user.employee_id);
            ServiceError::Forbidden.into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// Extract and verify the JWT from the Authorization header
fn bearer_claims(request: &Request, jwt_service: &JwtService) -> Option<Claims> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Accept both "Bearer <token>" and a raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    jwt_service.verify_token(token).ok()
}
