use rusqlite::Error as RusqliteError;
use rusqlite::ErrorCode;
use std::io::Error as IoError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pre-flight check rejected the operation before anything was written.
    #[error("{0}")]
    ValidationError(String),

    /// The database, table, column or row the operation targets does not exist.
    #[error("{0}")]
    NotFoundError(String),

    /// SQLite refused a write because of a uniqueness, not-null or foreign key constraint.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("SQLite error occurred: {0}")]
    RusqliteError(RusqliteError),

    #[error("{context}: {source}")]
    IoError {
        context: String,
        #[source]
        source: IoError
    },

    #[error("CSV error occurred: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Malformed JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Could not format timestamp: {0}")]
    TimeFormatError(#[from] time::error::Format),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: IoError) -> Error {
        return Error::IoError { context: context.into(), source };
    }

    /// Wraps an I/O error raised while deleting a file, adding a hint when the cause is likely a permission problem.
    pub fn io_on_delete(path: &std::path::Path, source: IoError) -> Error {
        let context = match source.kind() {
            std::io::ErrorKind::PermissionDenied => format!(
                "Could not delete '{}'. Check that you have permission to modify the file and that no other program has it open",
                path.display()
            ),
            _ => format!("Could not delete '{}'", path.display())
        };
        return Error::IoError { context, source };
    }
}

impl From<RusqliteError> for Error {
    fn from(e: RusqliteError) -> Error {
        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Error::ConstraintViolation(e.to_string()),
            _ => Error::RusqliteError(e)
        }
    }
}

impl From<Error> for String {
    fn from(e: Error) -> String {
        return e.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn constraint_failures_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL);").unwrap();
        let err: Error = conn.execute("INSERT INTO t (v) VALUES (NULL)", []).unwrap_err().into();
        assert!(matches!(err, Error::ConstraintViolation(_)), "{err:?}");

        let err: Error = conn.execute("INSERT INTO missing (v) VALUES (1)", []).unwrap_err().into();
        assert!(matches!(err, Error::RusqliteError(_)), "{err:?}");
    }

    #[test]
    fn permission_hint_on_delete() {
        let source = IoError::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io_on_delete(std::path::Path::new("/tmp/x.db"), source);
        assert!(err.to_string().contains("permission"));
    }
}
