//! Versioned schema migrations.
//!
//! Every migration is recorded in `schema_migrations` in the same transaction
//! that applies it, so a workspace either ends a run fully migrated or exactly
//! as it started. Steps are also written to be safe against databases that were
//! partially migrated by older ad-hoc scripts (columns already present, rows
//! already backfilled).

use crate::legacy;
use crate::schema::{table_exists, table_has_column};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    apply: fn(&Connection) -> anyhow::Result<usize>,
}

/// Ordered registry. Append only; never renumber.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_profile_columns",
        apply: migrate_users_profile_columns,
    },
    Migration {
        version: 2,
        name: "attendance_lecture_counts",
        apply: migrate_attendance_lecture_counts,
    },
    Migration {
        version: 3,
        name: "attendance_lecture_bounds",
        apply: migrate_attendance_lecture_bounds,
    },
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub run_id: String,
    pub applied_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// None when nothing was pending.
    pub run_id: Option<String>,
    pub applied: Vec<AppliedMigration>,
    pub rows_backfilled: usize,
}

pub fn ensure_migrations_table(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations(
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            run_id TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn applied(conn: &Connection) -> anyhow::Result<Vec<AppliedMigration>> {
    if !table_exists(conn, "schema_migrations")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT version, name, run_id, applied_at FROM schema_migrations ORDER BY version",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AppliedMigration {
                version: r.get(0)?,
                name: r.get(1)?,
                run_id: r.get(2)?,
                applied_at: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn is_applied(conn: &Connection, version: i64) -> anyhow::Result<bool> {
    if !table_exists(conn, "schema_migrations")? {
        return Ok(false);
    }
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM schema_migrations WHERE version = ?",
            [version],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Versions in the registry that have no record yet.
pub fn pending(conn: &Connection) -> anyhow::Result<Vec<i64>> {
    let mut out = Vec::new();
    for m in MIGRATIONS {
        if !is_applied(conn, m.version)? {
            out.push(m.version);
        }
    }
    Ok(out)
}

pub fn run_pending(conn: &Connection) -> anyhow::Result<MigrationReport> {
    ensure_migrations_table(conn)?;
    let pending = pending(conn)?;
    if pending.is_empty() {
        tracing::debug!("schema up to date");
        return Ok(MigrationReport {
            run_id: None,
            applied: Vec::new(),
            rows_backfilled: 0,
        });
    }

    let run_id = Uuid::new_v4().to_string();
    tracing::info!(run_id = %run_id, pending = ?pending, "applying schema migrations");

    let tx = conn.unchecked_transaction()?;
    let mut applied = Vec::with_capacity(pending.len());
    let mut rows_backfilled = 0usize;

    for m in MIGRATIONS.iter().filter(|m| pending.contains(&m.version)) {
        let rows = match (m.apply)(&tx) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    run_id = %run_id,
                    version = m.version,
                    name = m.name,
                    error = %e,
                    "migration failed; rolling back"
                );
                let _ = tx.rollback();
                return Err(e.context(format!("migration {} ({}) failed", m.version, m.name)));
            }
        };
        rows_backfilled += rows;

        let applied_at = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO schema_migrations(version, name, run_id, applied_at) VALUES(?, ?, ?, ?)",
            (m.version, m.name, &run_id, &applied_at),
        )
        .with_context(|| format!("failed to record migration {}", m.version))?;
        tracing::info!(version = m.version, name = m.name, rows, "migration applied");

        applied.push(AppliedMigration {
            version: m.version,
            name: m.name.to_string(),
            run_id: run_id.clone(),
            applied_at,
        });
    }

    tx.commit().context("failed to commit migration run")?;

    Ok(MigrationReport {
        run_id: Some(run_id),
        applied,
        rows_backfilled,
    })
}

fn migrate_users_profile_columns(conn: &Connection) -> anyhow::Result<usize> {
    if !table_exists(conn, "users")? {
        return Ok(0);
    }
    if !table_has_column(conn, "users", "name")? {
        conn.execute(
            "ALTER TABLE users ADD COLUMN name TEXT NOT NULL DEFAULT 'User'",
            [],
        )?;
    }
    if !table_has_column(conn, "users", "reset_token")? {
        conn.execute("ALTER TABLE users ADD COLUMN reset_token TEXT", [])?;
    }
    if !table_has_column(conn, "users", "reset_token_expires")? {
        conn.execute("ALTER TABLE users ADD COLUMN reset_token_expires TEXT", [])?;
    }
    Ok(0)
}

fn migrate_attendance_lecture_counts(conn: &Connection) -> anyhow::Result<usize> {
    if !table_exists(conn, "attendance")? {
        return Ok(0);
    }
    if !table_has_column(conn, "attendance", "lectures_present")? {
        conn.execute(
            "ALTER TABLE attendance ADD COLUMN lectures_present INTEGER DEFAULT 1",
            [],
        )?;
    }
    if !table_has_column(conn, "attendance", "lectures_total")? {
        conn.execute(
            "ALTER TABLE attendance ADD COLUMN lectures_total INTEGER DEFAULT 1",
            [],
        )?;
    }
    backfill_lecture_counts(conn)
}

/// Derive `lectures_present` / `lectures_total` from the legacy `is_present`
/// flag for rows that still hold unmigrated counts.
///
/// A row is unmigrated when either count is NULL, or when it holds the
/// `1/1` pair that `ADD COLUMN ... DEFAULT 1` fills in. Rows with any other
/// counts were written with explicit values after the columns existed and
/// are left alone, whatever their legacy flag says. Present rows become
/// `1/1` and everything else `0/1`; a NULL count next to a valid total keeps
/// that total.
///
/// Applying it again changes nothing. Returns the number of rows written;
/// 0 when the table has no legacy column.
pub fn backfill_lecture_counts(conn: &Connection) -> anyhow::Result<usize> {
    if !table_has_column(conn, "attendance", "is_present")? {
        return Ok(0);
    }

    let derived: Vec<(i64, i64, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT id, is_present, lectures_present, lectures_total FROM attendance ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let present: Option<i64> = row.get(2)?;
            let total: Option<i64> = row.get(3)?;
            let total = match (present, total) {
                (Some(1), Some(1)) => 1,
                (None, Some(t)) if t >= 1 => t,
                (None, _) | (_, None) => 1,
                _ => continue,
            };
            let status = legacy::status_from_legacy(row.get_ref(1)?);
            out.push((id, status.lectures_present(total), total));
        }
        out
    };

    let mut update = conn.prepare(
        "UPDATE attendance SET lectures_present = ?, lectures_total = ? WHERE id = ?",
    )?;
    for (id, lectures_present, lectures_total) in &derived {
        update.execute((lectures_present, lectures_total, id))?;
    }
    tracing::debug!(rows = derived.len(), "lecture counts backfilled from legacy flag");
    Ok(derived.len())
}

fn migrate_attendance_lecture_bounds(conn: &Connection) -> anyhow::Result<usize> {
    if !table_exists(conn, "attendance")? {
        return Ok(0);
    }
    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS attendance_lecture_bounds_insert
         BEFORE INSERT ON attendance
         WHEN NEW.lectures_present IS NULL
           OR NEW.lectures_total IS NULL
           OR NEW.lectures_total < 1
           OR NEW.lectures_present < 0
           OR NEW.lectures_present > NEW.lectures_total
         BEGIN
           SELECT RAISE(ABORT, 'lectures_present must be between 0 and lectures_total');
         END;
         CREATE TRIGGER IF NOT EXISTS attendance_lecture_bounds_update
         BEFORE UPDATE OF lectures_present, lectures_total ON attendance
         WHEN NEW.lectures_present IS NULL
           OR NEW.lectures_total IS NULL
           OR NEW.lectures_total < 1
           OR NEW.lectures_present < 0
           OR NEW.lectures_present > NEW.lectures_total
         BEGIN
           SELECT RAISE(ABORT, 'lectures_present must be between 0 and lectures_total');
         END;",
    )?;
    Ok(0)
}
