//! Lecture-partitioned attendance: one row per user, subject and day holding
//! how many of that day's lectures were attended.

use crate::error::{StoreError, StoreResult};
use crate::legacy::AttendanceStatus;
use crate::{subjects, users};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Attended/scheduled lecture counts for one day. Always satisfies
/// `0 <= present <= total` and `total >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureCount {
    lectures_present: i64,
    lectures_total: i64,
}

impl LectureCount {
    pub fn new(lectures_present: i64, lectures_total: i64) -> StoreResult<Self> {
        if lectures_total < 1 {
            return Err(StoreError::InvalidInput(format!(
                "lectures_total must be at least 1 (got {})",
                lectures_total
            )));
        }
        if lectures_present < 0 || lectures_present > lectures_total {
            return Err(StoreError::InvalidInput(format!(
                "lectures_present must be between 0 and {} (got {})",
                lectures_total, lectures_present
            )));
        }
        Ok(Self {
            lectures_present,
            lectures_total,
        })
    }

    pub fn from_status(status: AttendanceStatus, lectures_total: i64) -> StoreResult<Self> {
        Self::new(status.lectures_present(lectures_total), lectures_total)
    }

    pub fn present(&self) -> i64 {
        self.lectures_present
    }

    pub fn total(&self) -> i64 {
        self.lectures_total
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: i64,
    pub date: String,
    pub lectures_present: i64,
    pub lectures_total: i64,
}

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        user_id: r.get(1)?,
        subject_id: r.get(2)?,
        date: r.get(3)?,
        lectures_present: r.get(4)?,
        lectures_total: r.get(5)?,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub attended: i64,
    pub total_marked: i64,
    pub total_lectures: i64,
    pub remaining: i64,
    pub percentage: f64,
}

/// One subject's row on the marking form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub subject_id: i64,
    /// 0 means "no lecture that day" and clears any existing record.
    pub lectures_total: i64,
    #[serde(deserialize_with = "form_status")]
    pub status: AttendanceStatus,
}

fn form_status<'de, D>(d: D) -> Result<AttendanceStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    Ok(AttendanceStatus::from_form_value(&raw))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkSummary {
    pub date: String,
    pub upserted: usize,
    pub deleted: usize,
}

/// Body of the toggle call the web UI makes (`POST /api/toggle-attendance`).
#[derive(Debug, Clone, Deserialize)]
pub struct ToggleAttendance {
    pub subject_id: i64,
    pub is_present: bool,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub success: bool,
    pub record: AttendanceRecord,
    pub stats: SubjectStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSubject {
    pub id: i64,
    pub name: String,
    pub stats: SubjectStats,
    pub marked_today: bool,
    pub today_present: i64,
    pub today_total: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub today: String,
    pub subjects: Vec<DashboardSubject>,
    pub total_attended: i64,
    pub total_classes: i64,
    pub overall_percentage: f64,
}

pub fn parse_date(raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| StoreError::InvalidInput(format!("date must be YYYY-MM-DD (got {:?})", raw)))
}

/// Lenient form of [`parse_date`] used by the marking form: a missing or
/// malformed date means `today`.
pub fn parse_date_or(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    match raw {
        Some(s) => match parse_date(s) {
            Ok(d) => d,
            Err(_) => {
                tracing::warn!(date = s, "unparseable attendance date; using today");
                today
            }
        },
        None => today,
    }
}

pub fn percentage(attended: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = attended as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

fn require_user(conn: &Connection, user_id: i64) -> StoreResult<()> {
    if !users::exists(conn, user_id)? {
        return Err(StoreError::NotFound("user"));
    }
    Ok(())
}

pub fn find(
    conn: &Connection,
    user_id: i64,
    subject_id: i64,
    date: NaiveDate,
) -> StoreResult<Option<AttendanceRecord>> {
    let rec = conn
        .query_row(
            "SELECT id, user_id, subject_id, date, lectures_present, lectures_total
             FROM attendance
             WHERE user_id = ? AND subject_id = ? AND date = ?",
            (user_id, subject_id, date.format(DATE_FORMAT).to_string()),
            record_from_row,
        )
        .optional()?;
    Ok(rec)
}

fn upsert(
    conn: &Connection,
    user_id: i64,
    subject_id: i64,
    date: NaiveDate,
    count: LectureCount,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO attendance(user_id, subject_id, date, lectures_present, lectures_total)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(user_id, subject_id, date) DO UPDATE SET
           lectures_present = excluded.lectures_present,
           lectures_total = excluded.lectures_total",
        (
            user_id,
            subject_id,
            date.format(DATE_FORMAT).to_string(),
            count.present(),
            count.total(),
        ),
    )?;
    Ok(())
}

/// Record a whole day's attendance from the marking form.
pub fn mark(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    entries: &[MarkEntry],
) -> StoreResult<MarkSummary> {
    require_user(conn, user_id)?;
    for e in entries {
        if e.lectures_total < 0 {
            return Err(StoreError::InvalidInput(format!(
                "lectures_total must not be negative (subject {})",
                e.subject_id
            )));
        }
        subjects::get(conn, e.subject_id)?;
    }

    let date_str = date.format(DATE_FORMAT).to_string();
    let tx = conn.unchecked_transaction()?;
    let mut upserted = 0usize;
    let mut deleted = 0usize;
    for e in entries {
        if e.lectures_total == 0 {
            deleted += tx.execute(
                "DELETE FROM attendance WHERE user_id = ? AND subject_id = ? AND date = ?",
                (user_id, e.subject_id, &date_str),
            )?;
            continue;
        }
        let count = LectureCount::from_status(e.status, e.lectures_total)?;
        upsert(&tx, user_id, e.subject_id, date, count)?;
        upserted += 1;
    }
    tx.commit()?;

    tracing::info!(user_id, date = %date_str, upserted, deleted, "attendance marked");
    Ok(MarkSummary {
        date: date_str,
        upserted,
        deleted,
    })
}

pub fn toggle(
    conn: &Connection,
    user_id: i64,
    req: &ToggleAttendance,
    today: NaiveDate,
) -> StoreResult<ToggleOutcome> {
    require_user(conn, user_id)?;
    subjects::get(conn, req.subject_id)?;
    let date = match req.date.as_deref() {
        Some(s) if !s.trim().is_empty() => parse_date(s)?,
        _ => today,
    };

    let status = AttendanceStatus::from_bool(req.is_present);
    let total = find(conn, user_id, req.subject_id, date)?
        .map(|r| r.lectures_total)
        .unwrap_or(1);
    let count = LectureCount::from_status(status, total)?;
    upsert(conn, user_id, req.subject_id, date, count)?;

    let record = find(conn, user_id, req.subject_id, date)?
        .ok_or(StoreError::NotFound("attendance record"))?;
    tracing::debug!(
        user_id,
        subject_id = req.subject_id,
        date = %record.date,
        is_present = req.is_present,
        "attendance toggled"
    );
    Ok(ToggleOutcome {
        success: true,
        record,
        stats: subject_stats(conn, user_id, req.subject_id)?,
    })
}

pub fn subject_stats(conn: &Connection, user_id: i64, subject_id: i64) -> StoreResult<SubjectStats> {
    let subject = subjects::get(conn, subject_id)?;
    let (attended, total_marked): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(lectures_present), 0), COALESCE(SUM(lectures_total), 0)
         FROM attendance
         WHERE user_id = ? AND subject_id = ?",
        (user_id, subject_id),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(SubjectStats {
        attended,
        total_marked,
        total_lectures: subject.total_lectures,
        remaining: (subject.total_lectures - total_marked).max(0),
        percentage: percentage(attended, total_marked),
    })
}

pub fn dashboard(conn: &Connection, user_id: i64, today: NaiveDate) -> StoreResult<Dashboard> {
    require_user(conn, user_id)?;
    let mut out = Vec::new();
    let mut total_attended = 0i64;
    let mut total_classes = 0i64;
    for subject in subjects::list(conn)? {
        let stats = subject_stats(conn, user_id, subject.id)?;
        let today_record = find(conn, user_id, subject.id, today)?;
        total_attended += stats.attended;
        total_classes += stats.total_marked;
        out.push(DashboardSubject {
            id: subject.id,
            name: subject.name,
            stats,
            marked_today: today_record.is_some(),
            today_present: today_record.as_ref().map(|r| r.lectures_present).unwrap_or(0),
            today_total: today_record.as_ref().map(|r| r.lectures_total).unwrap_or(0),
        });
    }
    Ok(Dashboard {
        today: today.format(DATE_FORMAT).to_string(),
        subjects: out,
        total_attended,
        total_classes,
        overall_percentage: percentage(total_attended, total_classes),
    })
}

/// A user's records for one subject, newest first.
pub fn records(conn: &Connection, user_id: i64, subject_id: i64) -> StoreResult<Vec<AttendanceRecord>> {
    subjects::get(conn, subject_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, subject_id, date, lectures_present, lectures_total
         FROM attendance
         WHERE user_id = ? AND subject_id = ?
         ORDER BY date DESC",
    )?;
    let rows = stmt
        .query_map((user_id, subject_id), record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
