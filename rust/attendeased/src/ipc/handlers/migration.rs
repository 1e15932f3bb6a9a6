use crate::db;
use crate::ipc::helpers::{require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::migrate;
use crate::schema;
use serde_json::json;

fn handle_schema_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        schema::report(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
    });
    respond(&req.id, outcome)
}

fn handle_migration_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let applied = migrate::applied(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        let pending = migrate::pending(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        Ok(json!({ "applied": applied, "pending": pending }))
    });
    respond(&req.id, outcome)
}

fn run_migrations(state: &AppState, want_backup: bool) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let workspace = state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;

    let pending =
        migrate::pending(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let mut backup_path = None;
    if want_backup && !pending.is_empty() {
        let out = db::write_pre_migration_backup(workspace)
            .map_err(|e| HandlerErr::new("backup_failed", format!("{e:#}")))?;
        backup_path = Some(out.to_string_lossy().to_string());
    }

    let report = migrate::run_pending(conn).map_err(|e| {
        HandlerErr::new("migration_failed", format!("{e:#}"))
            .with_details(json!({ "pending": pending }))
    })?;
    Ok(json!({ "report": report, "backupPath": backup_path }))
}

/// Apply pending migrations on demand (used when auto-migrate is off).
/// `params.backup` (default true) writes a bundle first if anything is pending.
fn handle_migration_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    let want_backup = req
        .params
        .get("backup")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    respond(&req.id, run_migrations(state, want_backup))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schema.report" => Some(handle_schema_report(state, req)),
        "migration.status" => Some(handle_migration_status(state, req)),
        "migration.run" => Some(handle_migration_run(state, req)),
        _ => None,
    }
}
