//! Application setup and router configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domains::auth::{JwtService, TokenRevocationStore};
use crate::kernel::ServerDeps;
use crate::server::middleware::{jwt_auth_middleware, require_admin, require_auth};
use crate::server::routes::{
    admin_status_handler, assign_number_handler, batch_status_handler, create_number_handler,
    delete_number_handler, employee_status_handler, get_number_handler, handle_risk_handler,
    health_handler, info_handler, initiate_handler, list_batches_handler, list_numbers_handler,
    logout_handler, number_history_handler, resolve_issue_handler, submit_handler,
    unassign_number_handler, update_number_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub deps: Arc<ServerDeps>,
    pub jwt_service: Arc<JwtService>,
    pub revocations: Arc<dyn TokenRevocationStore>,
}

impl AppState {
    pub fn new(
        deps: ServerDeps,
        jwt_service: JwtService,
        revocations: Arc<dyn TokenRevocationStore>,
    ) -> Self {
        Self {
            db_pool: deps.db_pool.clone(),
            deps: Arc::new(deps),
            jwt_service: Arc::new(jwt_service),
            revocations,
        }
    }
}

/// Build the route tree with auth and state, without CORS or tracing.
///
/// `rate_limit` guards the public submit endpoint per client IP; the key is
/// taken from forwarding headers or the peer address, so it needs a server
/// started with connect info.
pub fn build_router(state: AppState, rate_limit: bool) -> Router {
    let protected = Router::new()
        .route(
            "/mobilenumbers",
            post(create_number_handler).get(list_numbers_handler),
        )
        .route(
            "/mobilenumbers/:phone",
            get(get_number_handler)
                .patch(update_number_handler)
                .delete(delete_number_handler),
        )
        .route("/mobilenumbers/:phone/history", get(number_history_handler))
        .route("/mobilenumbers/:phone/assign", post(assign_number_handler))
        .route(
            "/mobilenumbers/:phone/unassign",
            post(unassign_number_handler),
        )
        .route("/mobilenumbers/:phone/risk", post(handle_risk_handler))
        .route("/employees/:id/status", post(employee_status_handler))
        .route("/auth/logout", post(logout_handler))
        .route_layer(middleware::from_fn(require_auth));

    // Campaign administration
    let admin = Router::new()
        .route("/verification/initiate", post(initiate_handler))
        .route("/verification/batch/:id", get(batch_status_handler))
        .route("/verification/batches", get(list_batches_handler))
        .route("/verification/admin/status", get(admin_status_handler))
        .route(
            "/verification/issues/:id/resolve",
            post(resolve_issue_handler),
        )
        .route_layer(middleware::from_fn(require_admin));

    let mut submit = Router::new().route("/verification/submit", post(submit_handler));
    if rate_limit {
        // 10 requests per second per IP with bursts of 20
        match GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .use_headers()
            .finish()
        {
            Some(config) => {
                submit = submit.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => tracing::warn!("Invalid rate limit configuration; submit is not rate limited"),
        }
    }

    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/verification/info", get(info_handler))
        .merge(submit);

    let jwt_service = state.jwt_service.clone();
    let revocations = state.revocations.clone();

    Router::new()
        .merge(protected)
        .merge(admin)
        .merge(public)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), revocations.clone(), req, next)
        }))
        .layer(Extension(state))
}

/// Full application: routes plus CORS and request tracing.
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    build_router(state, true)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Any origin when none are configured (development).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
