//! Error types for the reconciliation engine.

use std::path::PathBuf;

/// Errors that can occur while declaring or reconciling a schema.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection source could not hand out a session.
    #[error("Could not acquire a database connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// Database error while executing a statement or catalog query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement was rejected by a non-sqlx connection source.
    #[error("Statement rejected: {0}")]
    Rejected(String),

    /// Two tables share a name.
    #[error("Table '{0}' is declared more than once")]
    DuplicateTable(String),

    /// Two columns of the same table share a name.
    #[error("Column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn {
        /// Table holding the duplicate.
        table: String,
        /// The duplicated column name.
        column: String,
    },

    /// A table or column name is longer than PostgreSQL keeps.
    #[error("Identifier '{0}' is longer than 63 bytes")]
    IdentifierTooLong(String),

    /// Reference constraints form a cycle, so no processing order exists.
    #[error("Tables reference each other in a cycle: {}", .0.join(" -> "))]
    ReferenceCycle(Vec<String>),

    /// Reading a schema file failed.
    #[error("Failed to read schema file '{path}': {source}")]
    SchemaFile {
        /// Path to the schema file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error means no connection could be obtained.
    ///
    /// Such errors abort a whole run instead of a single table.
    #[must_use]
    pub const fn is_acquire(&self) -> bool {
        matches!(self, Self::Acquire(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_tables() {
        let err = Error::ReferenceCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(
            err.to_string(),
            "Tables reference each other in a cycle: a -> b -> a"
        );
    }

    #[test]
    fn test_is_acquire() {
        assert!(Error::Acquire(sqlx::Error::PoolTimedOut).is_acquire());
        assert!(!Error::Database(sqlx::Error::PoolTimedOut).is_acquire());
        assert!(!Error::Rejected("nope".into()).is_acquire());
    }
}
