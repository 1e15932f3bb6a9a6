use crate::error::{is_unique_violation, StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

pub const DEFAULT_NAME: &str = "User";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    /// Reset tokens are only carried through; no reset flow lives here.
    pub has_reset_token: bool,
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        username: r.get(1)?,
        name: r.get(2)?,
        has_reset_token: r.get::<_, Option<String>>(3)?.is_some(),
    })
}

pub fn create(conn: &Connection, username: &str, name: Option<&str>) -> StoreResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(StoreError::InvalidInput("username must not be empty".to_string()));
    }
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);

    let taken: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE username = ?", [username], |r| r.get(0))
        .optional()?;
    if taken.is_some() {
        return Err(StoreError::Conflict(format!("username already registered: {}", username)));
    }

    conn.execute(
        "INSERT INTO users(username, name) VALUES(?, ?)",
        (username, name),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict(e.to_string())
        } else {
            // Carried-over tables may require columns this daemon does not
            // own (email, password hash); those surface as constraint_violation.
            StoreError::Database(e)
        }
    })?;
    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, "user created");
    get(conn, id)
}

pub fn get(conn: &Connection, user_id: i64) -> StoreResult<User> {
    conn.query_row(
        "SELECT id, username, name, reset_token FROM users WHERE id = ?",
        [user_id],
        user_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("user"))
}

pub fn exists(conn: &Connection, user_id: i64) -> StoreResult<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn list(conn: &Connection) -> StoreResult<Vec<User>> {
    let mut stmt =
        conn.prepare("SELECT id, username, name, reset_token FROM users ORDER BY id")?;
    let rows = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
