pub mod employee;

pub use employee::{Employee, EmployeeScope, EmploymentStatus, UpsertEmployee};
