// Main entry point for the number registry server

use std::sync::Arc;

use anyhow::{Context, Result};
use number_registry::domains::auth::PostgresRevocationStore;
use number_registry::domains::auth::JwtService;
use number_registry::domains::verification::activities::VerificationBatchHandler;
use number_registry::domains::verification::BatchTaskQueue;
use number_registry::kernel::jobs::{TaskRunner, TaskRunnerConfig};
use number_registry::kernel::scheduled_tasks::start_scheduler;
use number_registry::kernel::{BaseEmailSender, HttpEmailSender, LogEmailSender, ServerDeps};
use number_registry::server::{build_app, AppState};
use number_registry::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,number_registry=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting number registry");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Email transport: relay if configured, log-only otherwise
    let email: Arc<dyn BaseEmailSender> = match config.email_relay_url.clone() {
        Some(url) => {
            tracing::info!("Sending verification email through relay {}", url);
            Arc::new(HttpEmailSender::new(url, config.email_api_key.clone()))
        }
        None => {
            tracing::warn!("EMAIL_RELAY_URL not set; verification emails are only logged");
            Arc::new(LogEmailSender)
        }
    };

    let deps = ServerDeps::new(
        pool.clone(),
        email,
        config.verification_base_url.clone(),
        config.email_timeout,
    );

    // Batch runner
    let runner = TaskRunner::new(
        Arc::new(BatchTaskQueue::new(pool.clone())),
        Arc::new(VerificationBatchHandler::new(deps.clone())),
        deps.batch_wakeup.clone(),
        TaskRunnerConfig {
            max_concurrent: config.batch_max_concurrent_tasks,
            poll_interval: config.batch_poll_interval,
            lease: config.batch_lease,
            ..Default::default()
        },
    );
    let runner_shutdown = runner.shutdown_handle();
    let runner_task = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!(error = %e, "Task runner exited with error");
        }
    });

    // Scheduled maintenance
    let mut scheduler = start_scheduler(pool.clone())
        .await
        .context("Failed to start scheduler")?;

    // Build application
    let state = AppState::new(
        deps,
        JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        Arc::new(PostgresRevocationStore::new(pool.clone())),
    );
    let app = build_app(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Shutting down background work");
    runner_shutdown.request_shutdown();
    if let Err(e) = runner_task.await {
        tracing::error!(error = %e, "Task runner panicked");
    }
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
