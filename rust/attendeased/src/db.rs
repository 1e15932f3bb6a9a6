use crate::backup;
use crate::migrate::{self, MigrationReport};
use crate::schema;
use crate::subjects;
use anyhow::Context;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "attendance.db";
pub const BACKUP_DIR: &str = "backups";

#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub auto_migrate: bool,
    pub backup_before_migrate: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            backup_before_migrate: false,
        }
    }
}

pub struct OpenedWorkspace {
    pub conn: Connection,
    pub migration: Option<MigrationReport>,
    pub backup_path: Option<PathBuf>,
}

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

/// Open (creating if needed) the workspace database and bring it up to the
/// current schema.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    Ok(open_workspace(workspace, OpenOptions::default())?.conn)
}

pub fn open_workspace(workspace: &Path, opts: OpenOptions) -> anyhow::Result<OpenedWorkspace> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    let fresh = user_table_count(&conn)? == 0;

    // The bundle must hold the file exactly as found, so it is written before
    // the base schema touches anything.
    let mut backup_path = None;
    if opts.auto_migrate
        && opts.backup_before_migrate
        && !fresh
        && !migrate::pending(&conn)?.is_empty()
    {
        backup_path = Some(write_pre_migration_backup(workspace)?);
    }

    ensure_base_schema(&conn)?;

    let mut migration = None;
    if opts.auto_migrate {
        migration = Some(migrate::run_pending(&conn)?);
    }

    subjects::seed_defaults(&conn)?;

    Ok(OpenedWorkspace {
        conn,
        migration,
        backup_path,
    })
}

/// Bundle the workspace database into `<workspace>/backups/` ahead of a
/// migration run.
pub fn write_pre_migration_backup(workspace: &Path) -> anyhow::Result<PathBuf> {
    let out = workspace.join(BACKUP_DIR).join(format!(
        "pre-migrate-{}.zip",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    backup::export_workspace_bundle(workspace, &out).context("pre-migration backup failed")?;
    tracing::info!(path = %out.to_string_lossy(), "pre-migration backup written");
    Ok(out)
}

fn user_table_count(conn: &Connection) -> anyhow::Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;
    Ok(n)
}

/// Tables for a brand-new workspace. Databases carried over from the old web
/// app already have `users` and `attendance`; for those the statements below
/// are no-ops and the migrations in [`migrate`] fill in what is missing.
fn ensure_base_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT 'User',
            reset_token TEXT,
            reset_token_expires TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            total_lectures INTEGER NOT NULL DEFAULT 40
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            lectures_present INTEGER NOT NULL DEFAULT 1,
            lectures_total INTEGER NOT NULL DEFAULT 1,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(user_id, subject_id, date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_user ON attendance(user_id)",
        [],
    )?;
    // Some carried-over attendance tables predate per-subject tracking.
    if schema::table_has_column(conn, "attendance", "subject_id")? {
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attendance_user_subject ON attendance(user_id, subject_id)",
            [],
        )?;
    }

    migrate::ensure_migrations_table(conn)?;
    Ok(())
}
