//! Operator-only actions. Both are destructive and never run implicitly.

use crate::error::{StoreError, StoreResult};
use crate::schema;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserSummary {
    pub user_id: i64,
    pub attendance_deleted: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DropLegacySummary {
    pub dropped: bool,
}

/// Remove a user and every attendance row that references it, children
/// first, in one transaction.
pub fn delete_user(conn: &Connection, user_id: i64) -> StoreResult<DeleteUserSummary> {
    let tx = conn.unchecked_transaction()?;

    let exists: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?",
        [user_id],
        |r| r.get(0),
    )?;
    if exists == 0 {
        return Err(StoreError::NotFound("user"));
    }

    let attendance_deleted = tx.execute("DELETE FROM attendance WHERE user_id = ?", [user_id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    tx.commit()?;

    tracing::warn!(user_id, attendance_deleted, "user deleted");
    Ok(DeleteUserSummary {
        user_id,
        attendance_deleted,
    })
}

/// Irreversibly drop `attendance.is_present`.
///
/// Refuses unless the caller confirms and the schema report shows the lecture
/// migration fully applied. Running it after the column is gone is a no-op.
pub fn drop_legacy_column(conn: &Connection, confirm: bool) -> StoreResult<DropLegacySummary> {
    if !confirm {
        return Err(StoreError::InvalidInput(
            "dropping is_present is irreversible; pass confirm=true".to_string(),
        ));
    }

    let report = schema::report(conn)?;
    if !report.attendance.legacy_column_present {
        return Ok(DropLegacySummary { dropped: false });
    }
    if !report.lecture_migration_verified() {
        return Err(StoreError::Conflict(format!(
            "lecture migration not verified (pending={:?}, null counts={}, violations={})",
            report.pending,
            report.attendance.null_lecture_counts,
            report.attendance.invariant_violations
        )));
    }

    // SQLite refuses when the schema still names the column elsewhere, e.g.
    // the `CHECK (is_present IN (0, 1))` older SQLAlchemy emits for Boolean.
    conn.execute("ALTER TABLE attendance DROP COLUMN is_present", [])
        .map_err(|e| {
            tracing::warn!(error = %e, "legacy column drop refused by SQLite");
            StoreError::Conflict(format!(
                "is_present is still referenced by the attendance table definition \
                 (for example a CHECK constraint) and cannot be dropped in place: {}",
                e
            ))
        })?;
    tracing::warn!("legacy attendance.is_present column dropped");
    Ok(DropLegacySummary { dropped: true })
}
