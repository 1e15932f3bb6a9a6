use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

pub const DEFAULT_TOTAL_LECTURES: i64 = 40;
const DEFAULT_SUBJECT_COUNT: usize = 8;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub total_lectures: i64,
}

/// Populate an empty `subjects` table with the stock course list.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))?;
    if n > 0 {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO subjects(name, total_lectures) VALUES(?, ?)")?;
        for i in 1..=DEFAULT_SUBJECT_COUNT {
            stmt.execute((format!("Subject {}", i), DEFAULT_TOTAL_LECTURES))?;
        }
    }
    tx.commit()?;
    tracing::info!(count = DEFAULT_SUBJECT_COUNT, "default subjects added");
    Ok(DEFAULT_SUBJECT_COUNT)
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, COALESCE(total_lectures, 40) FROM subjects ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                total_lectures: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, subject_id: i64) -> StoreResult<Subject> {
    conn.query_row(
        "SELECT id, name, COALESCE(total_lectures, 40) FROM subjects WHERE id = ?",
        [subject_id],
        |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                total_lectures: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or(StoreError::NotFound("subject"))
}

/// Planned lecture count for a subject. Values below 1 fall back to the
/// default of 40.
pub fn set_total_lectures(conn: &Connection, subject_id: i64, total: i64) -> StoreResult<Subject> {
    let total = normalize_total_lectures(total);
    let changed = conn.execute(
        "UPDATE subjects SET total_lectures = ? WHERE id = ?",
        (total, subject_id),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("subject"));
    }
    get(conn, subject_id)
}

pub fn normalize_total_lectures(total: i64) -> i64 {
    if total < 1 {
        DEFAULT_TOTAL_LECTURES
    } else {
        total
    }
}
