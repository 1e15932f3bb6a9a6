use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};

/// Attendance status as stored from now on. Every historical spelling of the
/// old `is_present` flag collapses to one of these two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn from_bool(present: bool) -> Self {
        if present {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }

    pub fn is_present(self) -> bool {
        self == AttendanceStatus::Present
    }

    /// Form values used by the marking screen: "present" / "absent".
    /// Anything else is treated as present, matching the form's default.
    pub fn from_form_value(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("absent") {
            AttendanceStatus::Absent
        } else {
            AttendanceStatus::Present
        }
    }

    /// Lectures attended out of `lectures_total` under this status.
    pub fn lectures_present(self, lectures_total: i64) -> i64 {
        match self {
            AttendanceStatus::Present => lectures_total,
            AttendanceStatus::Absent => 0,
        }
    }
}

/// Normalize a raw `attendance.is_present` cell.
///
/// Databases written by different environments stored the flag as an
/// integer (`1`/`0`), as Postgres-style text (`'t'`/`'f'`), or left it NULL.
/// Only an unambiguous "true" is present; NULL, blobs and unrecognized
/// values are absent.
pub fn status_from_legacy(value: ValueRef<'_>) -> AttendanceStatus {
    match value {
        ValueRef::Null => AttendanceStatus::Absent,
        ValueRef::Integer(i) => AttendanceStatus::from_bool(i == 1),
        ValueRef::Real(f) => AttendanceStatus::from_bool(f == 1.0),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => status_from_legacy_text(s),
            Err(_) => AttendanceStatus::Absent,
        },
        ValueRef::Blob(_) => AttendanceStatus::Absent,
    }
}

pub fn status_from_legacy_text(raw: &str) -> AttendanceStatus {
    let t = raw.trim();
    let present = t.eq_ignore_ascii_case("t") || t.eq_ignore_ascii_case("true") || t == "1";
    AttendanceStatus::from_bool(present)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_spellings() {
        assert_eq!(status_from_legacy(ValueRef::Integer(1)), AttendanceStatus::Present);
        assert_eq!(status_from_legacy(ValueRef::Text(b"t")), AttendanceStatus::Present);
        assert_eq!(status_from_legacy(ValueRef::Text(b" T ")), AttendanceStatus::Present);
        assert_eq!(status_from_legacy(ValueRef::Text(b"true")), AttendanceStatus::Present);
        assert_eq!(status_from_legacy(ValueRef::Text(b"1")), AttendanceStatus::Present);
        assert_eq!(status_from_legacy(ValueRef::Real(1.0)), AttendanceStatus::Present);
    }

    #[test]
    fn absent_spellings_and_garbage() {
        assert_eq!(status_from_legacy(ValueRef::Integer(0)), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Text(b"f")), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Null), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Integer(2)), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Integer(-1)), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Text(b"yes")), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Text(b"")), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Text(&[0xff, 0xfe])), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Blob(b"t")), AttendanceStatus::Absent);
        assert_eq!(status_from_legacy(ValueRef::Real(0.5)), AttendanceStatus::Absent);
    }

    #[test]
    fn form_value_defaults_to_present() {
        assert_eq!(AttendanceStatus::from_form_value("absent"), AttendanceStatus::Absent);
        assert_eq!(AttendanceStatus::from_form_value("Absent "), AttendanceStatus::Absent);
        assert_eq!(AttendanceStatus::from_form_value("present"), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::from_form_value(""), AttendanceStatus::Present);
    }

    #[test]
    fn lectures_present_follows_status() {
        assert_eq!(AttendanceStatus::Present.lectures_present(3), 3);
        assert_eq!(AttendanceStatus::Absent.lectures_present(3), 0);
    }
}
