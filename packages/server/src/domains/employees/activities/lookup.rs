use sqlx::PgConnection;

use crate::common::{EmployeeId, ServiceError, ServiceResult};
use crate::domains::employees::models::Employee;

/// Load an employee who must exist and still be employed.
pub async fn require_active_employee(
    employee_id: &EmployeeId,
    conn: &mut PgConnection,
) -> ServiceResult<Employee> {
    let employee = Employee::find_by_id(employee_id, &mut *conn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("employee {}", employee_id)))?;

    if !employee.is_active() {
        return Err(ServiceError::PreconditionFailed(format!(
            "employee {} is not active",
            employee_id
        )));
    }
    Ok(employee)
}
