#![allow(dead_code)]

use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}-{}",
        prefix,
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::SeqCst),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendeased");
    let mut cmd = Command::new(exe);
    cmd.env_remove("ATTENDEASE_WORKSPACE")
        .env_remove("ATTENDEASE_AUTO_MIGRATE")
        .env_remove("ATTENDEASE_BACKUP_BEFORE_MIGRATE")
        .env("ATTENDEASE_LOG", "warn");
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendeased");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    serde_json::from_str(line.trim()).expect("parse response json")
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Send a request expected to fail; returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{} unexpectedly ok: {}", method, value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> bool {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql).expect("prepare pragma table_info");
    let mut rows = stmt.query([]).expect("query pragma table_info");
    while let Some(row) = rows.next().expect("next row") {
        let name: String = row.get(1).expect("column name");
        if name == column {
            return true;
        }
    }
    false
}

/// Build an `attendance.db` shaped like the old web app's database, before
/// any lecture columns existed. Legacy flags are stored the mixed ways real
/// deployments left them.
///
/// Rows (id: is_present): 1: 1, 2: 0, 3: 't', 4: 'f', 5: NULL, 6: 'true',
/// 7: 2, 8: 'maybe'. Users 1 and 10; subjects 1 and 2.
pub fn write_legacy_db(workspace: &Path) -> PathBuf {
    let db_path = workspace.join("attendance.db");
    let conn = Connection::open(&db_path).expect("open legacy db");
    conn.execute_batch(
        "CREATE TABLE users (
            id INTEGER NOT NULL,
            username VARCHAR(80) NOT NULL,
            email VARCHAR(120) NOT NULL,
            password_hash VARCHAR(256) NOT NULL,
            created_at DATETIME,
            PRIMARY KEY (id),
            UNIQUE (username),
            UNIQUE (email)
        );
        CREATE TABLE subjects (
            id INTEGER NOT NULL,
            name VARCHAR(100) NOT NULL,
            total_lectures INTEGER,
            PRIMARY KEY (id)
        );
        CREATE TABLE attendance (
            id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            date DATE NOT NULL,
            is_present BOOLEAN,
            created_at DATETIME,
            PRIMARY KEY (id),
            CONSTRAINT unique_attendance UNIQUE (user_id, subject_id, date),
            FOREIGN KEY(user_id) REFERENCES users (id),
            FOREIGN KEY(subject_id) REFERENCES subjects (id)
        );
        INSERT INTO users(id, username, email, password_hash) VALUES (1, 'erp1001', 'a@example.com', 'pbkdf2:sha256:600000$a$b');
        INSERT INTO users(id, username, email, password_hash) VALUES (10, 'erp1010', 'b@example.com', 'pbkdf2:sha256:600000$c$d');
        INSERT INTO subjects(id, name, total_lectures) VALUES (1, 'Maths', 40);
        INSERT INTO subjects(id, name, total_lectures) VALUES (2, 'Physics', 40);
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (1, 1, 1, '2024-09-02', 1);
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (2, 1, 1, '2024-09-03', 0);
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (3, 1, 2, '2024-09-02', 't');
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (4, 1, 2, '2024-09-03', 'f');
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (5, 10, 1, '2024-09-02', NULL);
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (6, 10, 1, '2024-09-03', 'true');
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (7, 10, 2, '2024-09-02', 2);
        INSERT INTO attendance(id, user_id, subject_id, date, is_present) VALUES (8, 10, 2, '2024-09-03', 'maybe');",
    )
    .expect("seed legacy db");
    db_path
}

/// Expected (lectures_present, lectures_total) per legacy row id.
pub const LEGACY_EXPECTED: [(i64, i64, i64); 8] = [
    (1, 1, 1),
    (2, 0, 1),
    (3, 1, 1),
    (4, 0, 1),
    (5, 0, 1),
    (6, 1, 1),
    (7, 0, 1),
    (8, 0, 1),
];

pub fn lecture_counts(conn: &Connection) -> Vec<(i64, i64, i64)> {
    let mut stmt = conn
        .prepare("SELECT id, lectures_present, lectures_total FROM attendance ORDER BY id")
        .expect("prepare counts");
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .expect("query counts")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect counts")
}
