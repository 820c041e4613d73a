//! Failures of the order desk database layer.
//!
//! [`crate::store::SqliteStore`] wraps these in
//! [`crate::store::StoreError::Database`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A query against the batch, rule, history or work order tables failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database file's parent directory could not be created.
    #[error("Cannot prepare database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema step failed; the database stays at the previous version.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A thread panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_directory() {
        let err = DatabaseError::Io {
            path: PathBuf::from("/srv/orderdesk"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/srv/orderdesk"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_migration_error_names_version() {
        let err = DatabaseError::Migration {
            version: 5,
            reason: "duplicate column".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed at version 5: duplicate column");
    }
}
