//! Catalog introspection.
//!
//! Snapshots of the live catalog for one table. They are taken fresh for
//! every pass and never cached: the reconcilers change the catalog as they go.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::source::Session;

/// A live column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Native type name, e.g. `character varying`.
    pub data_type: String,
    /// Declared maximum length for character types.
    pub max_length: Option<i32>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

impl ColumnInfo {
    /// Returns whether `declared` names the same type, ignoring case.
    #[must_use]
    pub fn type_matches(&self, declared: &str) -> bool {
        self.data_type.eq_ignore_ascii_case(declared)
    }
}

/// Kind of a live constraint, from `pg_constraint.contype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `p`
    PrimaryKey,
    /// `f`
    ForeignKey,
    /// `u`
    Unique,
    /// `c`
    Check,
    /// Any other code (exclusion, trigger, not-null).
    Other(char),
}

impl ConstraintKind {
    /// Parses a `contype` code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "p" => Self::PrimaryKey,
            "f" => Self::ForeignKey,
            "u" => Self::Unique,
            "c" => Self::Check,
            other => Self::Other(other.chars().next().unwrap_or('?')),
        }
    }

    /// Returns the `contype` code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::PrimaryKey => 'p',
            Self::ForeignKey => 'f',
            Self::Unique => 'u',
            Self::Check => 'c',
            Self::Other(c) => c,
        }
    }

    /// Returns whether fix mode drops constraints of this kind.
    #[must_use]
    pub const fn is_droppable(self) -> bool {
        matches!(self, Self::ForeignKey | Self::Unique)
    }
}

/// A live constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintInfo {
    /// Constraint name.
    pub name: String,
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Definition as printed by `pg_get_constraintdef`.
    pub definition: String,
}

/// A live index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Definition as printed by `pg_indexes.indexdef`.
    pub definition: String,
}

/// Columns of one table keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSnapshot {
    columns: HashMap<String, ColumnInfo>,
}

impl ColumnSnapshot {
    /// Builds a snapshot from catalog rows.
    #[must_use]
    pub fn from_rows(rows: Vec<ColumnInfo>) -> Self {
        Self {
            columns: rows.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    /// Returns the number of live columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true for a table without columns (a fresh shell).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the live column names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Reads the live columns of `table`.
///
/// A table with no columns, or no table at all, yields an empty snapshot.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub async fn snapshot_columns<S: Session>(session: &mut S, table: &str) -> Result<ColumnSnapshot> {
    let rows = session.fetch_columns(table).await?;
    debug!(table = %table, count = rows.len(), "Introspected columns");
    Ok(ColumnSnapshot::from_rows(rows))
}

/// Reads the live constraints of `table`.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub async fn snapshot_constraints<S: Session>(
    session: &mut S,
    table: &str,
) -> Result<Vec<ConstraintInfo>> {
    let rows = session.fetch_constraints(table).await?;
    debug!(table = %table, count = rows.len(), "Introspected constraints");
    Ok(rows)
}

/// Reads the live indexes of `table`.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub async fn snapshot_indexes<S: Session>(session: &mut S, table: &str) -> Result<Vec<IndexInfo>> {
    let rows = session.fetch_indexes(table).await?;
    debug!(table = %table, count = rows.len(), "Introspected indexes");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::schema::{ColumnDefinition, ColumnType};
    use crate::source::ConnectionSource;
    use crate::statement::Statement;

    #[test]
    fn test_constraint_kind_codes() {
        assert_eq!(ConstraintKind::from_code("p"), ConstraintKind::PrimaryKey);
        assert_eq!(ConstraintKind::from_code("f"), ConstraintKind::ForeignKey);
        assert_eq!(ConstraintKind::from_code("u"), ConstraintKind::Unique);
        assert_eq!(ConstraintKind::from_code("c"), ConstraintKind::Check);
        assert_eq!(ConstraintKind::from_code("x"), ConstraintKind::Other('x'));
        assert_eq!(ConstraintKind::Other('t').code(), 't');
    }

    #[test]
    fn test_droppable_kinds() {
        assert!(ConstraintKind::ForeignKey.is_droppable());
        assert!(ConstraintKind::Unique.is_droppable());
        assert!(!ConstraintKind::PrimaryKey.is_droppable());
        assert!(!ConstraintKind::Check.is_droppable());
    }

    #[test]
    fn test_type_matches_ignores_case() {
        let info = ColumnInfo {
            name: "email".to_string(),
            data_type: "character varying".to_string(),
            max_length: Some(255),
            nullable: true,
        };
        assert!(info.type_matches("CHARACTER VARYING"));
        assert!(!info.type_matches("text"));
    }

    #[tokio::test]
    async fn test_snapshot_of_missing_table_is_empty() {
        let source = MemorySource::new();
        let mut session = source.acquire().await.unwrap();
        let snapshot = snapshot_columns(&mut session, "nothing").await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot_constraints(&mut session, "nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_catalog() {
        let source = MemorySource::new();
        source
            .apply(&Statement::CreateShell {
                table: "users".to_string(),
            })
            .unwrap();
        source
            .apply(&Statement::AddColumn {
                table: "users".to_string(),
                column: ColumnDefinition::new("id", ColumnType::Serial).primary_key(),
            })
            .unwrap();
        source
            .apply(&Statement::AddColumn {
                table: "users".to_string(),
                column: ColumnDefinition::new("email", ColumnType::Varchar).char_limit(100),
            })
            .unwrap();

        let mut session = source.acquire().await.unwrap();
        let snapshot = snapshot_columns(&mut session, "users").await.unwrap();
        assert_eq!(snapshot.names(), vec!["email", "id"]);
        let email = snapshot.get("email").unwrap();
        assert_eq!(email.data_type, "character varying");
        assert_eq!(email.max_length, Some(100));
        assert!(email.nullable);
        assert!(!snapshot.get("id").unwrap().nullable);

        let constraints = snapshot_constraints(&mut session, "users").await.unwrap();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].name, "users_pkey");
        assert_eq!(constraints[0].kind, ConstraintKind::PrimaryKey);
    }
}
