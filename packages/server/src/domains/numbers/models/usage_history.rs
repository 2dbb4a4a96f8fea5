use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{EmployeeId, MobileNumberId, UsageRecordId};

/// One possession interval. Only `ended_on` is ever written after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub mobile_number_id: MobileNumberId,
    pub holder_id: EmployeeId,
    pub purpose: Option<String>,
    pub started_on: NaiveDate,
    pub ended_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    pub async fn open<'e>(
        mobile_number_id: MobileNumberId,
        holder_id: &EmployeeId,
        purpose: Option<&str>,
        started_on: NaiveDate,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO number_usage_history (id, mobile_number_id, holder_id, purpose, started_on)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(UsageRecordId::new())
        .bind(mobile_number_id)
        .bind(holder_id)
        .bind(purpose)
        .bind(started_on)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// The open interval for (number, holder), if any.
    pub async fn find_open<'e>(
        mobile_number_id: MobileNumberId,
        holder_id: &EmployeeId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM number_usage_history
            WHERE mobile_number_id = $1 AND holder_id = $2 AND ended_on IS NULL
            "#,
        )
        .bind(mobile_number_id)
        .bind(holder_id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn close<'e>(
        id: UsageRecordId,
        ended_on: NaiveDate,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE number_usage_history
            SET ended_on = $2
            WHERE id = $1 AND ended_on IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ended_on)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn for_number<'e>(
        mobile_number_id: MobileNumberId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM number_usage_history
            WHERE mobile_number_id = $1
            ORDER BY started_on, created_at
            "#,
        )
        .bind(mobile_number_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
