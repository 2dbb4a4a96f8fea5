pub mod lookup;
pub mod status;

pub use lookup::require_active_employee;
pub use status::{on_status_changed, StatusChangeOutcome};
