pub mod create;
pub mod possession;
pub mod queries;
pub mod risk;
pub mod update;

pub use create::{create_number, CreateNumberInput};
pub use possession::{assign_number, unassign_number, AssignNumberInput, UnassignNumberInput};
pub use queries::{get_number, list_numbers, number_history, ListNumbersQuery, NumberHistory};
pub use risk::{flag_risk_for_applicant, handle_risk, HandleRiskInput, RiskAction};
pub use update::{delete_number, update_number, UpdateNumberInput};
