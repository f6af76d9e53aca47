//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A named CHECK/UNIQUE constraint rejected the write.
    #[error("Constraint '{constraint}' violated: {message}")]
    Constraint { constraint: String, message: String },

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored value could not be decoded into its domain type.
    #[error("Corrupt value in column '{column}': {reason}")]
    Decode { column: String, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// Maps SQLite constraint failures onto [`DatabaseError::Constraint`],
    /// keeping the constraint name SQLite reports.
    pub fn classify(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                let constraint = message
                    .rsplit(": ")
                    .next()
                    .unwrap_or(message.as_str())
                    .to_string();
                return DatabaseError::Constraint {
                    constraint,
                    message: message.clone(),
                };
            }
        }
        DatabaseError::Sqlite(err)
    }

    pub fn decode(column: &str, reason: impl ToString) -> Self {
        DatabaseError::Decode {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the violated constraint, if this is a constraint failure.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::Constraint { constraint, .. } => Some(constraint),
            _ => None,
        }
    }
}
