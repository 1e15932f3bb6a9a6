//! Read-only schema introspection.
//!
//! Operators use [`report`] to confirm a migration actually landed before any
//! destructive follow-up such as dropping the legacy `is_present` column.

use crate::migrate::{self, AppliedMigration};
use rusqlite::Connection;
use serde::Serialize;

/// Tables the daemon owns, in report order.
pub const REPORTED_TABLES: [&str; 4] = ["users", "subjects", "attendance", "schema_migrations"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub exists: bool,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub row_count: i64,
    pub legacy_column_present: bool,
    pub lecture_columns_present: bool,
    pub null_lecture_counts: i64,
    pub invariant_violations: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    pub tables: Vec<TableInfo>,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<i64>,
    pub attendance: AttendanceSummary,
}

impl SchemaReport {
    /// True once every registered migration is recorded and the attendance
    /// rows are fully populated and within bounds.
    pub fn lecture_migration_verified(&self) -> bool {
        self.pending.is_empty()
            && self.attendance.lecture_columns_present
            && self.attendance.null_lecture_counts == 0
            && self.attendance.invariant_violations == 0
    }
}

pub fn table_exists(conn: &Connection, table: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [table],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

pub fn table_columns(conn: &Connection, table: &str) -> anyhow::Result<Vec<ColumnInfo>> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let cols = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols)
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn attendance_summary(conn: &Connection) -> anyhow::Result<AttendanceSummary> {
    if !table_exists(conn, "attendance")? {
        return Ok(AttendanceSummary {
            row_count: 0,
            legacy_column_present: false,
            lecture_columns_present: false,
            null_lecture_counts: 0,
            invariant_violations: 0,
        });
    }

    let row_count: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |r| r.get(0))?;
    let legacy_column_present = table_has_column(conn, "attendance", "is_present")?;
    let lecture_columns_present = table_has_column(conn, "attendance", "lectures_present")?
        && table_has_column(conn, "attendance", "lectures_total")?;

    let (null_lecture_counts, invariant_violations) = if lecture_columns_present {
        conn.query_row(
            "SELECT
               COALESCE(SUM(CASE WHEN lectures_present IS NULL OR lectures_total IS NULL THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN lectures_present < 0
                                   OR lectures_total < 1
                                   OR lectures_present > lectures_total THEN 1 ELSE 0 END), 0)
             FROM attendance",
            [],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
        )?
    } else {
        (row_count, 0)
    };

    Ok(AttendanceSummary {
        row_count,
        legacy_column_present,
        lecture_columns_present,
        null_lecture_counts,
        invariant_violations,
    })
}

pub fn report(conn: &Connection) -> anyhow::Result<SchemaReport> {
    let mut tables = Vec::with_capacity(REPORTED_TABLES.len());
    for name in REPORTED_TABLES {
        let exists = table_exists(conn, name)?;
        let columns = if exists {
            table_columns(conn, name)?
        } else {
            Vec::new()
        };
        tables.push(TableInfo {
            name: name.to_string(),
            exists,
            columns,
        });
    }

    Ok(SchemaReport {
        tables,
        applied: migrate::applied(conn)?,
        pending: migrate::pending(conn)?,
        attendance: attendance_summary(conn)?,
    })
}
