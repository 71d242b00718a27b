pub mod comment;
pub mod project;
pub mod task;
pub mod timesheet;
pub mod user;
