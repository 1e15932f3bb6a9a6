/// Errors returned by store operations (users, subjects, attendance, admin).
///
/// Each variant maps onto a stable IPC error code through [`StoreError::code`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::InvalidInput(_) => "bad_params",
            StoreError::Conflict(_) => "conflict",
            StoreError::Database(e) if is_constraint_violation(e) => "constraint_violation",
            StoreError::Database(_) => "db_query_failed",
            StoreError::Io(_) => "io_failed",
            StoreError::Other(_) => "internal",
        }
    }
}

pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(StoreError::NotFound("user").code(), "not_found");
        assert_eq!(StoreError::InvalidInput("x".into()).code(), "bad_params");
        assert_eq!(StoreError::Conflict("x".into()).code(), "conflict");
        assert_eq!(
            StoreError::Database(rusqlite::Error::QueryReturnedNoRows).code(),
            "db_query_failed"
        );
    }

    #[test]
    fn unique_and_not_null_failures_are_told_apart() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        conn.execute(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, k TEXT UNIQUE, v TEXT NOT NULL)",
            [],
        )
        .expect("create");
        conn.execute("INSERT INTO t(k, v) VALUES('a', 'x')", []).expect("insert");

        let dup = conn
            .execute("INSERT INTO t(k, v) VALUES('a', 'y')", [])
            .expect_err("duplicate");
        assert!(is_unique_violation(&dup));

        let missing = conn
            .execute("INSERT INTO t(k) VALUES('b')", [])
            .expect_err("not null");
        assert!(is_constraint_violation(&missing));
        assert!(!is_unique_violation(&missing));
        assert_eq!(StoreError::Database(missing).code(), "constraint_violation");
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(StoreError::NotFound("subject").to_string(), "subject not found");
    }
}
