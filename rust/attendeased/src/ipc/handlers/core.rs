use crate::db::{self, OpenOptions};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Open `path` as the active workspace, replacing any open one.
pub fn select_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<serde_json::Value> {
    let opts = OpenOptions {
        auto_migrate: state.config.auto_migrate,
        backup_before_migrate: state.config.backup_before_migrate,
    };
    // Release the previous handle before opening; the path may be the same file.
    state.db = None;
    let opened = db::open_workspace(path, opts)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(opened.conn);
    tracing::info!(path = %path.to_string_lossy(), "workspace opened");

    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "migration": opened.migration,
        "backupPath": opened.backup_path.map(|p| p.to_string_lossy().to_string()),
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, &path) {
        Ok(result) => ok(&req.id, result),
        Err(e) => {
            tracing::error!(path = %path.to_string_lossy(), error = ?e, "workspace open failed");
            state.workspace = None;
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
