use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use typed_builder::TypedBuilder;

use crate::common::{EmployeeId, MobileNumberId, PageRequest, ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "mobile_number_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NumberStatus {
    Idle,
    InUse,
    PendingDeactivation,
    Deactivated,
    RiskPending,
    UserReported,
}

impl NumberStatus {
    /// States that never carry a holder.
    pub fn releases_holder(self) -> bool {
        matches!(self, Self::Idle | Self::Deactivated)
    }

    /// Rules for a direct status patch. Possession only changes through
    /// assign/unassign.
    pub fn check_patch(self, target: NumberStatus) -> ServiceResult<()> {
        if target == Self::InUse {
            return Err(ServiceError::invalid_state(
                "a number is put in use by assigning it",
            ));
        }
        if self == Self::InUse {
            return Err(ServiceError::invalid_state(
                "an in-use number must be unassigned before its status can change",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MobileNumber {
    pub id: MobileNumberId,
    pub phone: String,
    pub applicant_id: EmployeeId,
    pub current_holder_id: Option<EmployeeId>,
    pub status: NumberStatus,
    pub purpose: Option<String>,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
    pub application_date: Option<NaiveDate>,
    pub cancellation_date: Option<NaiveDate>,
    pub last_confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewMobileNumber<'a> {
    pub phone: &'a str,
    pub applicant_id: &'a EmployeeId,
    #[builder(default)]
    pub application_date: Option<NaiveDate>,
    #[builder(default)]
    pub purpose: Option<String>,
    #[builder(default)]
    pub vendor: Option<String>,
    #[builder(default)]
    pub remarks: Option<String>,
}

/// Listing filters; all optional and combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFilter {
    pub status: Option<NumberStatus>,
    pub holder_id: Option<EmployeeId>,
    pub applicant_id: Option<EmployeeId>,
    pub phone_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberSortField {
    #[default]
    Phone,
    Status,
    CreatedAt,
    LastConfirmedAt,
}

impl NumberSortField {
    fn column(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::LastConfirmedAt => "last_confirmed_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl MobileNumber {
    /// Append a remark line, keeping earlier remarks.
    pub fn append_remarks(&mut self, remarks: &str) {
        let remarks = remarks.trim();
        if remarks.is_empty() {
            return;
        }
        self.remarks = Some(match self.remarks.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{}\n{}", existing, remarks),
            _ => remarks.to_string(),
        });
    }

    pub async fn insert<'e>(input: NewMobileNumber<'_>, executor: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO mobile_numbers
                (id, phone, applicant_id, status, purpose, vendor, remarks, application_date)
            VALUES ($1, $2, $3, 'idle', $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(MobileNumberId::new())
        .bind(input.phone)
        .bind(input.applicant_id)
        .bind(input.purpose)
        .bind(input.vendor)
        .bind(input.remarks)
        .bind(input.application_date)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// True if the phone was ever registered, tombstoned rows included.
    pub async fn phone_taken<'e>(phone: &str, executor: impl PgExecutor<'e>) -> Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM mobile_numbers WHERE phone = $1)")
                .bind(phone)
                .fetch_one(executor)
                .await?;
        Ok(taken)
    }

    pub async fn find_by_phone<'e>(
        phone: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM mobile_numbers WHERE phone = $1 AND deleted_at IS NULL",
        )
        .bind(phone)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// Same as `find_by_phone` but takes a row lock for the enclosing
    /// transaction.
    pub async fn lock_by_phone<'e>(
        phone: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM mobile_numbers WHERE phone = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(phone)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// Numbers an employee currently holds and could still be asked about.
    pub async fn find_held_by<'e>(
        holder_id: &EmployeeId,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM mobile_numbers
            WHERE current_holder_id = $1
              AND deleted_at IS NULL
              AND status <> 'deactivated'
            ORDER BY phone
            "#,
        )
        .bind(holder_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Persist every mutable column of a (locked) row.
    pub async fn save<'e>(&self, executor: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE mobile_numbers
            SET applicant_id = $2,
                current_holder_id = $3,
                status = $4,
                purpose = $5,
                vendor = $6,
                remarks = $7,
                cancellation_date = $8,
                last_confirmed_at = $9,
                deleted_at = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.applicant_id)
        .bind(&self.current_holder_id)
        .bind(self.status)
        .bind(&self.purpose)
        .bind(&self.vendor)
        .bind(&self.remarks)
        .bind(self.cancellation_date)
        .bind(self.last_confirmed_at)
        .bind(self.deleted_at)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Move every live, non-deactivated number applied for by `applicant_id`
    /// to `risk_pending`. Returns the number of rows changed.
    pub async fn flag_risk_for_applicant<'e>(
        applicant_id: &EmployeeId,
        executor: impl PgExecutor<'e>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE mobile_numbers
            SET status = 'risk_pending', updated_at = NOW()
            WHERE applicant_id = $1
              AND deleted_at IS NULL
              AND status NOT IN ('deactivated', 'risk_pending')
            "#,
        )
        .bind(applicant_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn record_confirmation<'e>(
        id: MobileNumberId,
        purpose: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE mobile_numbers
            SET last_confirmed_at = NOW(),
                purpose = COALESCE($2, purpose),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(purpose)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Flag a number as disputed by its holder. A pending risk review keeps
    /// precedence.
    pub async fn mark_user_reported<'e>(
        id: MobileNumberId,
        executor: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE mobile_numbers
            SET status = 'user_reported', updated_at = NOW()
            WHERE id = $1 AND status <> 'risk_pending'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Filtered, sorted page of live numbers plus the unpaged total.
    pub async fn list<'e, E>(
        filter: &NumberFilter,
        sort: NumberSortField,
        order: SortOrder,
        page: PageRequest,
        executor: E,
    ) -> Result<(Vec<Self>, i64)>
    where
        E: PgExecutor<'e> + Copy,
    {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM mobile_numbers WHERE deleted_at IS NULL",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(executor).await?;

        let mut select =
            QueryBuilder::<Postgres>::new("SELECT * FROM mobile_numbers WHERE deleted_at IS NULL");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(sort.column())
            .push(" ")
            .push(order.keyword())
            .push(" NULLS LAST, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select.build_query_as::<Self>().fetch_all(executor).await?;
        Ok((items, total))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &NumberFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(holder) = &filter.holder_id {
        qb.push(" AND current_holder_id = ")
            .push_bind(holder.as_str().to_string());
    }
    if let Some(applicant) = &filter.applicant_id {
        qb.push(" AND applicant_id = ")
            .push_bind(applicant.as_str().to_string());
    }
    if let Some(fragment) = filter.phone_contains.as_deref().map(str::trim) {
        if !fragment.is_empty() {
            qb.push(" AND strpos(phone, ")
                .push_bind(fragment.to_string())
                .push(") > 0");
        }
    }
}
