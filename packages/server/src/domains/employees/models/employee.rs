use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use typed_builder::TypedBuilder;

use crate::common::EmployeeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "employment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Departed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub name: String,
    pub department: Option<String>,
    pub email: Option<String>,
    pub status: EmploymentStatus,
    pub hired_on: Option<NaiveDate>,
    pub terminated_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which employees a verification campaign targets. Only active employees
/// are ever returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeScope {
    All,
    Departments(Vec<String>),
    Ids(Vec<EmployeeId>),
}

/// Employee record as synced from the HR collaborator.
#[derive(TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct UpsertEmployee<'a> {
    pub employee_id: &'a EmployeeId,
    pub name: &'a str,
    #[builder(default)]
    pub department: Option<&'a str>,
    #[builder(default)]
    pub email: Option<&'a str>,
    #[builder(default = EmploymentStatus::Active)]
    pub status: EmploymentStatus,
    #[builder(default)]
    pub hired_on: Option<NaiveDate>,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status == EmploymentStatus::Active
    }

    /// An address worth handing to the mail relay.
    pub fn usable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && e.contains('@'))
    }

    pub async fn find_by_id<'e>(
        employee_id: &EmployeeId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM employees WHERE employee_id = $1")
            .bind(employee_id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Resolve a scope to active employees, ordered by id for stable batches.
    pub async fn find_active_by_scope<'e>(
        scope: &EmployeeScope,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let rows = match scope {
            EmployeeScope::All => {
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM employees WHERE status = 'active' ORDER BY employee_id",
                )
                .fetch_all(executor)
                .await?
            }
            EmployeeScope::Departments(names) => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM employees
                    WHERE status = 'active' AND department = ANY($1)
                    ORDER BY employee_id
                    "#,
                )
                .bind(names)
                .fetch_all(executor)
                .await?
            }
            EmployeeScope::Ids(ids) => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM employees
                    WHERE status = 'active' AND employee_id = ANY($1)
                    ORDER BY employee_id
                    "#,
                )
                .bind(ids_as_text(ids))
                .fetch_all(executor)
                .await?
            }
        };
        Ok(rows)
    }

    /// Load employees by id regardless of status, ordered by id.
    pub async fn find_by_ids<'e>(
        ids: &[EmployeeId],
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM employees WHERE employee_id = ANY($1) ORDER BY employee_id",
        )
        .bind(ids_as_text(ids))
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Set employment status; departure stamps the termination date once.
    pub async fn update_status<'e>(
        employee_id: &EmployeeId,
        status: EmploymentStatus,
        on: NaiveDate,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE employees
            SET status = $2,
                terminated_on = CASE
                    WHEN $2 = 'departed'::employment_status THEN COALESCE(terminated_on, $3)
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE employee_id = $1
            RETURNING *
            "#,
        )
        .bind(employee_id)
        .bind(status)
        .bind(on)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn upsert<'e>(input: UpsertEmployee<'_>, executor: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO employees (employee_id, name, department, email, status, hired_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (employee_id) DO UPDATE
            SET name = EXCLUDED.name,
                department = EXCLUDED.department,
                email = EXCLUDED.email,
                status = EXCLUDED.status,
                hired_on = EXCLUDED.hired_on,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.employee_id)
        .bind(input.name)
        .bind(input.department)
        .bind(input.email)
        .bind(input.status)
        .bind(input.hired_on)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }
}

fn ids_as_text(ids: &[EmployeeId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_string()).collect()
}
