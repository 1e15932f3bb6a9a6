use crate::ipc::helpers::{get_required_i64, require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::subjects;
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let all = subjects::list(conn)?;
        Ok(json!({ "subjects": all }))
    });
    respond(&req.id, outcome)
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let subject_id = get_required_i64(&req.params, "subjectId")?;
        // Non-numeric input resets to the default, like the settings form.
        let total = req
            .params
            .get("totalLectures")
            .and_then(|v| v.as_i64())
            .unwrap_or(subjects::DEFAULT_TOTAL_LECTURES);
        Ok(subjects::set_total_lectures(conn, subject_id, total)?)
    });
    respond(&req.id, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        _ => None,
    }
}
