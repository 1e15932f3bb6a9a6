use crate::admin;
use crate::ipc::helpers::{get_required_i64, require_db, respond};
use crate::ipc::types::{AppState, Request};

fn handle_delete_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "userId")?;
        Ok(admin::delete_user(conn, user_id)?)
    });
    respond(&req.id, outcome)
}

fn handle_drop_legacy_column(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let confirm = req
            .params
            .get("confirm")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(admin::drop_legacy_column(conn, confirm)?)
    });
    respond(&req.id, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.deleteUser" => Some(handle_delete_user(state, req)),
        "admin.dropLegacyColumn" => Some(handle_drop_legacy_column(state, req)),
        _ => None,
    }
}
