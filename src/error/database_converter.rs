use crate::error::AppError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Utility for converting database errors to structured AppError variants.
///
/// The queue only ever writes rows it created itself, so constraint
/// violations are rare; they are still mapped to readable variants so that a
/// broken migration shows up clearly in the worker log.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.message(), info.table_name(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        message: &str,
        table: Option<&str>,
        operation: &str,
    ) -> AppError {
        let entity = table.unwrap_or("record").to_string();
        match kind {
            DatabaseErrorKind::UniqueViolation => AppError::Validation {
                field: entity,
                reason: format!("Duplicate entry: {}", message),
            },
            DatabaseErrorKind::NotNullViolation | DatabaseErrorKind::CheckViolation => {
                AppError::Validation {
                    field: entity,
                    reason: message.to_string(),
                }
            }
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand => {
                AppError::ConnectionPool {
                    source: anyhow::Error::msg(format!("{}: {}", operation, message)),
                }
            }
            _ => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::msg(format!("Database error: {}", message)),
            },
        }
    }
}
