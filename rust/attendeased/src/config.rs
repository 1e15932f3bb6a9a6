//! Daemon configuration, read once at startup from the environment (and a
//! `.env` file when present).

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    /// `tracing` filter directive, e.g. `info` or `attendeased=debug`.
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Apply pending schema migrations when a workspace is opened.
    pub auto_migrate: bool,
    /// Write a backup bundle before applying migrations to an existing database.
    pub backup_before_migrate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            auto_migrate: true,
            backup_before_migrate: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparseable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            workspace: lookup("ATTENDEASE_WORKSPACE")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_filter: lookup("ATTENDEASE_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(d.log_filter),
            log_format: match lookup("ATTENDEASE_LOG_FORMAT").as_deref().map(str::trim) {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => d.log_format,
            },
            auto_migrate: lookup("ATTENDEASE_AUTO_MIGRATE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(d.auto_migrate),
            backup_before_migrate: lookup("ATTENDEASE_BACKUP_BEFORE_MIGRATE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(d.backup_before_migrate),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
