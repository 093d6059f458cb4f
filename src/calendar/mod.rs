pub mod occurrence;
pub mod service;

pub use service::CalendarService;
