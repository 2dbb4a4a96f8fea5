use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{ApplicantChangeId, EmployeeId, MobileNumberId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantChange {
    pub id: ApplicantChangeId,
    pub mobile_number_id: MobileNumberId,
    pub previous_applicant_id: EmployeeId,
    pub new_applicant_id: EmployeeId,
    pub changed_on: NaiveDate,
    pub operator_id: EmployeeId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApplicantChange {
    pub async fn record<'e>(
        mobile_number_id: MobileNumberId,
        previous_applicant_id: &EmployeeId,
        new_applicant_id: &EmployeeId,
        changed_on: NaiveDate,
        operator_id: &EmployeeId,
        reason: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO number_applicant_history
                (id, mobile_number_id, previous_applicant_id, new_applicant_id, changed_on, operator_id, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(ApplicantChangeId::new())
        .bind(mobile_number_id)
        .bind(previous_applicant_id)
        .bind(new_applicant_id)
        .bind(changed_on)
        .bind(operator_id)
        .bind(reason)
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
            SELECT * FROM number_applicant_history
            WHERE mobile_number_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(mobile_number_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
