pub mod applicant_history;
pub mod mobile_number;
pub mod usage_history;

pub use applicant_history::ApplicantChange;
pub use mobile_number::{
    MobileNumber, NewMobileNumber, NumberFilter, NumberSortField, NumberStatus, SortOrder,
};
pub use usage_history::UsageRecord;
