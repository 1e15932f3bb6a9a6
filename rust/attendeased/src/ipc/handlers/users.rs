use crate::ipc::helpers::{get_optional_str, get_required_str, require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::users;

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let username = get_required_str(&req.params, "username")?;
        let name = get_optional_str(&req.params, "name");
        Ok(users::create(conn, &username, name)?)
    });
    respond(&req.id, outcome)
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let all = users::list(conn)?;
        Ok(serde_json::json!({ "users": all }))
    });
    respond(&req.id, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        _ => None,
    }
}
