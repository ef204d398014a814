//! Conversions from external infrastructure errors into domain errors.

use dealflow_domain::{ConflictReason, DealflowError};
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DealflowError);

impl From<InfraError> for DealflowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DealflowError> for InfraError {
    fn from(value: DealflowError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoDealflowError {
    fn into_dealflow(self) -> DealflowError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → DealflowError */
/* -------------------------------------------------------------------------- */

impl IntoDealflowError for SqlError {
    fn into_dealflow(self) -> DealflowError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        DealflowError::DependencyUnavailable("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        DealflowError::DependencyUnavailable("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => DealflowError::conflict(
                        ConflictReason::UniqueViolation,
                        format!("unique constraint violation: {message}"),
                    ),
                    (ErrorCode::ConstraintViolation, 787) => {
                        DealflowError::Database("foreign key constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => DealflowError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => DealflowError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => DealflowError::not_found("row", "query returned no rows"),
            RE::FromSqlConversionFailure(column, _, cause) => DealflowError::Database(format!(
                "failed to convert sqlite value in column {column}: {cause}"
            )),
            RE::InvalidColumnType(_, name, ty) => {
                DealflowError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => {
                DealflowError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                DealflowError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => DealflowError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => DealflowError::Database("invalid SQL query".into()),
            other => DealflowError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_dealflow())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → DealflowError */
/* -------------------------------------------------------------------------- */

impl IntoDealflowError for r2d2::Error {
    fn into_dealflow(self) -> DealflowError {
        DealflowError::DependencyUnavailable(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_dealflow())
    }
}

/// Convert a rusqlite error into the domain error.
pub fn map_sql_error(err: SqlError) -> DealflowError {
    DealflowError::from(InfraError::from(err))
}

/// Convert a pool checkout failure into the domain error.
pub fn map_pool_error(err: r2d2::Error) -> DealflowError {
    DealflowError::from(InfraError::from(err))
}

/// Convert a failed blocking task into the domain error.
pub fn map_join_error(err: JoinError) -> DealflowError {
    if err.is_cancelled() {
        DealflowError::Internal("blocking database task cancelled".into())
    } else {
        DealflowError::Internal(format!("blocking database task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use rusqlite::ffi::{Error as FfiError, ErrorCode};

    use super::*;

    fn failure(code: ErrorCode, extended_code: i32, message: &str) -> SqlError {
        SqlError::SqliteFailure(FfiError { code, extended_code }, Some(message.into()))
    }

    #[test]
    fn sqlite_busy_maps_to_dependency_unavailable() {
        let err = map_sql_error(failure(ErrorCode::DatabaseBusy, 5, "database is locked"));
        assert_eq!(err.code(), "dependency_unavailable");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = map_sql_error(failure(
            ErrorCode::ConstraintViolation,
            2067,
            "UNIQUE constraint failed: offers.company_id, offers.offer_number",
        ));
        assert!(matches!(
            err,
            DealflowError::Conflict { reason: ConflictReason::UniqueViolation, .. }
        ));
    }

    #[test]
    fn primary_key_violation_maps_to_conflict() {
        let err = map_sql_error(failure(ErrorCode::ConstraintViolation, 1555, "PRIMARY KEY"));
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(map_sql_error(SqlError::QueryReturnedNoRows).code(), "not_found");
    }

    #[test]
    fn wrong_key_maps_to_config_error() {
        let err = map_sql_error(failure(ErrorCode::NotADatabase, 26, "file is not a database"));
        assert!(matches!(err, DealflowError::Config(_)));
    }

    #[test]
    fn other_failures_map_to_database() {
        let err = map_sql_error(failure(ErrorCode::SystemIoFailure, 10, "disk I/O error"));
        assert!(matches!(err, DealflowError::Database(message) if message.contains("disk I/O")));
    }

    #[test]
    fn infra_error_round_trips() {
        let original = DealflowError::Internal("boom".into());
        let wrapped = InfraError::from(original.clone());
        assert_eq!(DealflowError::from(wrapped), original);
    }
}
