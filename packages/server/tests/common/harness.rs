//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container per test binary, started and migrated on first use.
//! Tests share the database, so every fixture uses unique ids and phones.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use number_registry::domains::auth::{JwtService, PostgresRevocationStore};
use number_registry::kernel::{BaseEmailSender, ServerDeps};
use number_registry::server::AppState;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-integration-tests";
pub const VERIFICATION_BASE_URL: &str = "https://numbers.test/verify";

/// Addresses on this domain are rejected by the recording sender.
pub const BOUNCE_DOMAIN: &str = "@bounce.test";
/// Addresses on this domain never answer within the email timeout.
pub const SLOW_DOMAIN: &str = "@slow.test";

/// Email timeout used by every harness.
pub const EMAIL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub employee_name: String,
    pub link: String,
}

/// Records accepted messages instead of delivering them.
///
/// Shared by every test in the binary: a batch claimed by another test's
/// runner still lands here, so assertions filter by address.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn sent_to(&self, address: &str) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BaseEmailSender for RecordingEmailSender {
    async fn send_verification_email(
        &self,
        to_address: &str,
        employee_name: &str,
        verification_link: &str,
    ) -> Result<()> {
        if to_address.ends_with(BOUNCE_DOMAIN) {
            anyhow::bail!("mailbox unavailable");
        }
        if to_address.ends_with(SLOW_DOMAIN) {
            tokio::time::sleep(EMAIL_TIMEOUT * 4).await;
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to_address.to_string(),
            employee_name: employee_name.to_string(),
            link: verification_link.to_string(),
        });
        Ok(())
    }
}

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    emails: Arc<RecordingEmailSender>,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            emails: Arc::new(RecordingEmailSender::default()),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context over the shared database.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let number = create_number(..., &ctx.deps).await.unwrap();
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
    pub deps: ServerDeps,
    pub emails: Arc<RecordingEmailSender>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        let deps = ServerDeps::new(
            db_pool.clone(),
            infra.emails.clone(),
            VERIFICATION_BASE_URL.to_string(),
            EMAIL_TIMEOUT,
        );

        Ok(Self {
            db_pool,
            deps,
            emails: infra.emails.clone(),
        })
    }

    pub fn jwt_service(&self) -> JwtService {
        JwtService::new(TEST_JWT_SECRET, "number-registry-test".to_string())
    }

    /// Application state wired to this harness's database.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.deps.clone(),
            self.jwt_service(),
            Arc::new(PostgresRevocationStore::new(self.db_pool.clone())),
        )
    }
}
