use crate::attendance::{self, MarkEntry, ToggleAttendance};
use crate::ipc::helpers::{get_optional_str, get_required_i64, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use serde_json::json;

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn handle_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "userId")?;
        let date = attendance::parse_date_or(get_optional_str(&req.params, "date"), today());
        let entries: Vec<MarkEntry> = match req.params.get("entries") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| HandlerErr::bad_params(format!("invalid entries: {}", e)))?,
            None => return Err(HandlerErr::bad_params("missing entries")),
        };
        Ok(attendance::mark(conn, user_id, date, &entries)?)
    });
    respond(&req.id, outcome)
}

/// Same body as the web UI's `POST /api/toggle-attendance`
/// (`subject_id`, `is_present`, `date`) plus the acting `user_id`.
fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "user_id")?;
        let body: ToggleAttendance = serde_json::from_value(req.params.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid toggle body: {}", e)))?;
        Ok(attendance::toggle(conn, user_id, &body, today())?)
    });
    respond(&req.id, outcome)
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "userId")?;
        let subject_id = get_required_i64(&req.params, "subjectId")?;
        Ok(attendance::subject_stats(conn, user_id, subject_id)?)
    });
    respond(&req.id, outcome)
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "userId")?;
        let day = match get_optional_str(&req.params, "today") {
            Some(s) => attendance::parse_date(s)?,
            None => today(),
        };
        Ok(attendance::dashboard(conn, user_id, day)?)
    });
    respond(&req.id, outcome)
}

fn handle_records(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = require_db(state).and_then(|conn| {
        let user_id = get_required_i64(&req.params, "userId")?;
        let subject_id = get_required_i64(&req.params, "subjectId")?;
        let records = attendance::records(conn, user_id, subject_id)?;
        Ok(json!({ "records": records }))
    });
    respond(&req.id, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_mark(state, req)),
        "attendance.toggle" => Some(handle_toggle(state, req)),
        "attendance.stats" => Some(handle_stats(state, req)),
        "attendance.dashboard" => Some(handle_dashboard(state, req)),
        "attendance.records" => Some(handle_records(state, req)),
        _ => None,
    }
}
