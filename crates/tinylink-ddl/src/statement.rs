//! Typed statements emitted by the reconcilers.
//!
//! Reconcilers never build SQL strings directly: they produce [`Statement`]
//! values which are rendered to PostgreSQL text in one place. Identifiers are
//! double-quoted and interpolated, so they must come from trusted
//! configuration.
//!
//! Derived constraint and index names are cut to [`MAX_IDENTIFIER_LEN`]
//! bytes, as PostgreSQL does when it stores them, so the name the engine
//! computes is the name it later finds in the catalog.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::schema::ColumnDefinition;

/// Longest identifier PostgreSQL keeps, in bytes (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Quote an identifier (table name, column name, etc.).
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `table`, qualified by `namespace` when one is given.
#[must_use]
pub fn qualified_table(namespace: Option<&str>, table: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", quote_identifier(ns), quote_identifier(table)),
        None => quote_identifier(table),
    }
}

/// Cuts `name` to [`MAX_IDENTIFIER_LEN`] bytes without splitting a character.
#[must_use]
pub fn truncate_identifier(mut name: String) -> String {
    if name.len() > MAX_IDENTIFIER_LEN {
        let mut end = MAX_IDENTIFIER_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name of the foreign key on `column` of `table`.
#[must_use]
pub fn foreign_key_name(table: &str, column: &str) -> String {
    truncate_identifier(format!("{table}_{column}_fkey"))
}

/// Name of the unique constraint over `columns` of `table`.
#[must_use]
pub fn unique_name(table: &str, columns: &[String]) -> String {
    truncate_identifier(format!("{table}_{}_unique", columns.join("_")))
}

/// Name of the case-insensitive unique index over `columns` of `table`.
#[must_use]
pub fn unique_lower_name(table: &str, columns: &[String]) -> String {
    truncate_identifier(format!("{table}_{}_unique_lower", columns.join("_")))
}

/// Name of the secondary index over `columns` of `table`.
#[must_use]
pub fn index_name(table: &str, columns: &[String]) -> String {
    truncate_identifier(format!("idx_{table}_{}", columns.join("_")))
}

/// Name of the check constraint for `predicate` on `table`.
///
/// The suffix is derived from the table and predicate, so declaring the same
/// check again always yields the same name.
#[must_use]
pub fn check_name(table: &str, predicate: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    hasher.update([0]);
    hasher.update(predicate.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    truncate_identifier(format!("{table}_check_{}", &digest[..8]))
}

/// Body of a table constraint added with `ADD CONSTRAINT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintBody {
    /// `FOREIGN KEY (column) REFERENCES target_table(target_column)`.
    ForeignKey {
        /// Local column.
        column: String,
        /// Referenced table.
        target_table: String,
        /// Referenced column.
        target_column: String,
        /// Whether to add `ON DELETE CASCADE`.
        cascade: bool,
    },
    /// `UNIQUE (columns)`.
    Unique {
        /// Key columns.
        columns: Vec<String>,
    },
    /// `CHECK (predicate)`.
    Check {
        /// Opaque predicate.
        predicate: String,
    },
}

impl ConstraintBody {
    /// Renders the body as it follows `ADD CONSTRAINT <name>`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.render(None)
    }

    /// Renders the body with referenced tables qualified by `namespace`.
    #[must_use]
    pub fn render(&self, namespace: Option<&str>) -> String {
        match self {
            Self::ForeignKey {
                column,
                target_table,
                target_column,
                cascade,
            } => {
                let mut sql = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    quote_identifier(column),
                    qualified_table(namespace, target_table),
                    quote_identifier(target_column)
                );
                if *cascade {
                    sql.push_str(" ON DELETE CASCADE");
                }
                sql
            }
            Self::Unique { columns } => format!("UNIQUE ({})", quote_list(columns)),
            Self::Check { predicate } => format!("CHECK ({predicate})"),
        }
    }
}

/// One key part of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKey {
    /// Plain column.
    Column(String),
    /// `LOWER(column)`.
    Lower(String),
}

impl IndexKey {
    /// Returns the column this key reads.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Column(c) | Self::Lower(c) => c,
        }
    }

    fn to_sql(&self) -> String {
        match self {
            Self::Column(c) => quote_identifier(c),
            Self::Lower(c) => format!("LOWER({})", quote_identifier(c)),
        }
    }
}

/// An index to create with an existence guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Key parts in order.
    pub keys: Vec<IndexKey>,
    /// Whether this is a unique index.
    pub unique: bool,
}

/// A single statement the engine can execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// Create a table with no columns if it does not exist.
    CreateShell {
        /// Table name.
        table: String,
    },
    /// Add a column if it does not exist.
    AddColumn {
        /// Table name.
        table: String,
        /// Declared column.
        column: ColumnDefinition,
    },
    /// Tighten a column to NOT NULL.
    SetNotNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Add a named table constraint.
    AddConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Constraint body.
        body: ConstraintBody,
    },
    /// Drop a named table constraint.
    DropConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Create an index if it does not exist.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index to create.
        index: IndexSpec,
    },
    /// Raw seed SQL, executed verbatim.
    Seed {
        /// Statement text.
        sql: String,
    },
}

impl Statement {
    /// Renders the statement as PostgreSQL text with unqualified tables.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.render(None)
    }

    /// Renders the statement with every table qualified by `namespace`.
    ///
    /// Seed SQL is passed through untouched.
    #[must_use]
    pub fn render(&self, namespace: Option<&str>) -> String {
        match self {
            Self::CreateShell { table } => format!(
                "CREATE TABLE IF NOT EXISTS {} ()",
                qualified_table(namespace, table)
            ),
            Self::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                qualified_table(namespace, table),
                column_definition(column)
            ),
            Self::SetNotNull { table, column } => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
                qualified_table(namespace, table),
                quote_identifier(column)
            ),
            Self::AddConstraint { table, name, body } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {}",
                qualified_table(namespace, table),
                quote_identifier(name),
                body.render(namespace)
            ),
            Self::DropConstraint { table, name } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                qualified_table(namespace, table),
                quote_identifier(name)
            ),
            Self::CreateIndex { table, index } => create_index_sql(namespace, table, index),
            Self::Seed { sql } => sql.clone(),
        }
    }
}

/// Generates the column definition used by `ADD COLUMN`.
fn column_definition(column: &ColumnDefinition) -> String {
    let mut sql = format!(
        "{} {}",
        quote_identifier(&column.name),
        column.column_type.sql_name()
    );

    if let Some(limit) = column.effective_char_limit() {
        sql.push_str(&format!("({limit})"));
    }

    if column.primary {
        sql.push_str(" PRIMARY KEY");
    }

    if column.is_not_null() {
        sql.push_str(" NOT NULL");
    }

    if let Some(ref default) = column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.to_sql());
    }

    sql
}

// The index lands in its table's namespace, so only the table is qualified.
fn create_index_sql(namespace: Option<&str>, table: &str, index: &IndexSpec) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX IF NOT EXISTS ");
    sql.push_str(&quote_identifier(&index.name));
    sql.push_str(" ON ");
    sql.push_str(&qualified_table(namespace, table));
    sql.push_str(" (");
    let keys: Vec<String> = index.keys.iter().map(IndexKey::to_sql).collect();
    sql.push_str(&keys.join(", "));
    sql.push(')');
    sql
}
