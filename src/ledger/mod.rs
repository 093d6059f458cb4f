pub mod locks;
pub mod rules;
pub mod service;

pub use locks::EmployeeLocks;
pub use service::{LeaveLedger, Submission};
