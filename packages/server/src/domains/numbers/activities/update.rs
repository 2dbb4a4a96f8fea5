use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::common::{clean_text, today, ServiceError, ServiceResult};
use crate::domains::numbers::models::{MobileNumber, NumberStatus};
use crate::kernel::ServerDeps;

use super::possession::{lock_number, release_holder};

/// Partial update. Absent fields are left alone; a blank string clears a
/// text field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNumberInput {
    pub status: Option<NumberStatus>,
    pub purpose: Option<String>,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
}

pub async fn update_number(
    phone: &str,
    patch: UpdateNumberInput,
    deps: &ServerDeps,
) -> ServiceResult<MobileNumber> {
    let mut tx = deps.db_pool.begin().await?;
    let mut number = lock_number(phone, &mut tx).await?;
    let previous_status = number.status;

    if let Some(target) = patch.status {
        number.status.check_patch(target)?;

        if target != number.status {
            if target.releases_holder() {
                release_holder(&mut number, today(), &mut tx).await?;
            }
            if target == NumberStatus::Deactivated {
                number.cancellation_date = Some(today());
            }
            number.status = target;
        }
    }

    if let Some(purpose) = patch.purpose {
        number.purpose = clean_text(Some(purpose));
    }
    if let Some(vendor) = patch.vendor {
        number.vendor = clean_text(Some(vendor));
    }
    if let Some(remarks) = patch.remarks {
        number.remarks = clean_text(Some(remarks));
    }

    let number = number.save(&mut *tx).await?;
    tx.commit().await?;

    info!(
        phone = %number.phone,
        from = ?previous_status,
        to = ?number.status,
        "number updated"
    );
    Ok(number)
}

/// Tombstone a released number. It disappears from every lookup but its
/// phone stays reserved.
pub async fn delete_number(phone: &str, deps: &ServerDeps) -> ServiceResult<()> {
    let mut tx = deps.db_pool.begin().await?;
    let mut number = lock_number(phone, &mut tx).await?;

    if !matches!(number.status, NumberStatus::Idle | NumberStatus::Deactivated) {
        return Err(ServiceError::invalid_state(format!(
            "number {} is {:?}; only idle or deactivated numbers can be deleted",
            number.phone, number.status
        )));
    }

    number.deleted_at = Some(Utc::now());
    number.save(&mut *tx).await?;
    tx.commit().await?;

    info!(phone = %number.phone, "number deleted");
    Ok(())
}
