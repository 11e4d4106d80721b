use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Gateway failures. Messages carry the driver's description only,
/// never statement text or connection credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Row decode failed: {0}")]
    RowDecode(String),

    #[error("Query cancelled")]
    Cancelled,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::RowDecode(err.to_string()),
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code() {
                    Some(code) if sqlstate_is_unavailable(&code) => StoreError::Unavailable(message),
                    _ => StoreError::QueryFailed(message),
                }
            }
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

/// Server-reported states that mean "can't serve you right now" rather than
/// "your statement is wrong": connection exceptions (08), auth failures (28),
/// missing catalog (3D), and shutdown/startup (57P0x).
fn sqlstate_is_unavailable(code: &str) -> bool {
    ["08", "28", "3D", "57P0"]
        .iter()
        .any(|class| code.starts_with(*class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn io_failure_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: StoreError = sqlx::Error::Io(io).into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn missing_column_is_row_decode() {
        let err: StoreError = sqlx::Error::ColumnNotFound("bucket".into()).into();
        assert!(matches!(err, StoreError::RowDecode(_)));
    }

    #[test]
    fn connection_and_startup_states_are_unavailable() {
        for code in ["08006", "08001", "28P01", "28000", "3D000", "57P01", "57P03"] {
            assert!(sqlstate_is_unavailable(code), "{code}");
        }
    }

    #[test]
    fn statement_states_are_not_unavailable() {
        // undefined table, syntax error, statement cancelled, division by zero
        for code in ["42P01", "42601", "57014", "22012"] {
            assert!(!sqlstate_is_unavailable(code), "{code}");
        }
    }

    #[test]
    fn protocol_error_is_query_failed() {
        let err: StoreError = sqlx::Error::Protocol("unexpected message".into()).into();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }
}
