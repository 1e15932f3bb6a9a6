pub mod admin;
pub mod attendance;
pub mod backup;
pub mod core;
pub mod migration;
pub mod subjects;
pub mod users;
