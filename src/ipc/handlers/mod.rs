pub mod attendance;
pub mod core;
pub mod posts;
pub mod reports;
pub mod students;
