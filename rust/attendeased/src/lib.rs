//! AttendEase attendance store.
//!
//! Owns a workspace directory holding `attendance.db`, evolves carried-over
//! databases from the single `is_present` flag to per-day lecture counts, and
//! serves the store over a JSON-lines protocol (see [`ipc`]).

pub mod admin;
pub mod attendance;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod legacy;
pub mod migrate;
pub mod schema;
pub mod subjects;
pub mod users;
