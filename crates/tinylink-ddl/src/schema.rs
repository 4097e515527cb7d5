//! Declarative schema model.
//!
//! These types describe the tables the engine converges a database towards.
//! They are configuration: built once at startup (in code or from a JSON
//! document) and never mutated while a reconciliation runs.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::statement::MAX_IDENTIFIER_LEN;

/// Logical column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Auto-incrementing 32-bit identifier.
    Serial,
    /// Variable-length text with a length limit.
    Varchar,
    /// Fixed-length text.
    Char,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Boolean.
    Boolean,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// Date only.
    Date,
    /// IPv4 or IPv6 host address.
    Inet,
    /// Binary JSON document.
    Jsonb,
    /// UUID.
    Uuid,
}

impl ColumnType {
    /// Length used for bounded text columns that declare no limit.
    pub const DEFAULT_CHAR_LIMIT: u32 = 255;

    /// Returns the type name used in `ADD COLUMN`.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Serial => "SERIAL",
            Self::Varchar => "VARCHAR",
            Self::Char => "CHARACTER",
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMPTZ",
            Self::Date => "DATE",
            Self::Inet => "INET",
            Self::Jsonb => "JSONB",
            Self::Uuid => "UUID",
        }
    }

    /// Returns the spelling PostgreSQL reports in
    /// `information_schema.columns.data_type`.
    ///
    /// `SERIAL` is not a real type: the catalog sees an integer column with a
    /// sequence default.
    #[must_use]
    pub const fn catalog_name(self) -> &'static str {
        match self {
            Self::Serial | Self::Integer => "integer",
            Self::Varchar => "character varying",
            Self::Char => "character",
            Self::Text => "text",
            Self::BigInt => "bigint",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp without time zone",
            Self::TimestampTz => "timestamp with time zone",
            Self::Date => "date",
            Self::Inet => "inet",
            Self::Jsonb => "jsonb",
            Self::Uuid => "uuid",
        }
    }

    /// Returns whether the type takes a length qualifier.
    #[must_use]
    pub const fn is_bounded_text(self) -> bool {
        matches!(self, Self::Varchar | Self::Char)
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Boolean literal.
    Bool(bool),
    /// Time of insertion (`NOW()`).
    Now,
    /// Any other literal or expression, emitted verbatim.
    Literal(String),
}

impl DefaultValue {
    /// Creates a verbatim literal default.
    #[must_use]
    pub fn literal(value: impl ToString) -> Self {
        Self::Literal(value.to_string())
    }

    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Now => "NOW()".to_string(),
            Self::Literal(value) => value.clone(),
        }
    }
}

const fn default_nullable() -> bool {
    true
}

/// Declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Length limit for bounded text types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_limit: Option<u32>,
    /// Whether this column is the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Whether values must be unique.
    #[serde(default)]
    pub unique: bool,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl ColumnDefinition {
    /// Creates a new nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            char_limit: None,
            primary: false,
            unique: false,
            nullable: true,
            default: None,
        }
    }

    /// Sets the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary = true;
        self.nullable = false; // Primary keys are always NOT NULL
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the length limit.
    #[must_use]
    pub fn char_limit(mut self, limit: u32) -> Self {
        self.char_limit = Some(limit);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Returns whether the column must be NOT NULL.
    ///
    /// A primary key is NOT NULL even when declared nullable.
    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        !self.nullable || self.primary
    }

    /// Returns the length qualifier to emit, if the type takes one.
    #[must_use]
    pub fn effective_char_limit(&self) -> Option<u32> {
        self.column_type
            .is_bounded_text()
            .then(|| self.char_limit.unwrap_or(ColumnType::DEFAULT_CHAR_LIMIT))
    }
}

/// Declared table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintDefinition {
    /// Foreign key from a local column to another table.
    Reference {
        /// Local column.
        column: String,
        /// Referenced table.
        table: String,
        /// Referenced column; the target's primary key when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_column: Option<String>,
        /// Whether deletes cascade.
        #[serde(default)]
        cascade: bool,
    },
    /// Composite unique key.
    Unique {
        /// Columns forming the key.
        columns: Vec<String>,
    },
    /// Case-insensitive unique key, enforced by a unique index on `LOWER(col)`.
    UniqueLower {
        /// Columns forming the key.
        columns: Vec<String>,
    },
    /// Opaque boolean predicate.
    Check {
        /// Predicate in PostgreSQL syntax.
        predicate: String,
    },
    /// Non-unique secondary index.
    Index {
        /// Indexed columns.
        columns: Vec<String>,
        /// Explicit index name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ConstraintDefinition {
    /// Creates a foreign key to the primary key of `table`.
    #[must_use]
    pub fn reference(column: impl Into<String>, table: impl Into<String>, cascade: bool) -> Self {
        Self::Reference {
            column: column.into(),
            table: table.into(),
            target_column: None,
            cascade,
        }
    }

    /// Creates a foreign key to an explicit column of `table`.
    #[must_use]
    pub fn reference_to(
        column: impl Into<String>,
        table: impl Into<String>,
        target_column: impl Into<String>,
        cascade: bool,
    ) -> Self {
        Self::Reference {
            column: column.into(),
            table: table.into(),
            target_column: Some(target_column.into()),
            cascade,
        }
    }

    /// Creates a unique constraint.
    #[must_use]
    pub fn unique(columns: &[&str]) -> Self {
        Self::Unique {
            columns: to_owned(columns),
        }
    }

    /// Creates a case-insensitive unique constraint.
    #[must_use]
    pub fn unique_lower(columns: &[&str]) -> Self {
        Self::UniqueLower {
            columns: to_owned(columns),
        }
    }

    /// Creates a check constraint.
    #[must_use]
    pub fn check(predicate: impl Into<String>) -> Self {
        Self::Check {
            predicate: predicate.into(),
        }
    }

    /// Creates an auto-named index.
    #[must_use]
    pub fn index(columns: &[&str]) -> Self {
        Self::Index {
            columns: to_owned(columns),
            name: None,
        }
    }
}

fn to_owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(ToString::to_string).collect()
}

/// Declared table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Table-level constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDefinition>,
    /// Secondary indexes, one column list each.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Vec<String>>,
    /// Raw, self-idempotent statements run after the structure is in place.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seeds: Vec<String>,
}

impl TableDefinition {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            seeds: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintDefinition) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Adds a secondary index.
    #[must_use]
    pub fn index(mut self, columns: &[&str]) -> Self {
        self.indexes.push(to_owned(columns));
        self
    }

    /// Adds a seed statement.
    #[must_use]
    pub fn seed(mut self, statement: impl Into<String>) -> Self {
        self.seeds.push(statement.into());
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the name of the primary key column.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary)
            .map(|c| c.name.as_str())
    }

    /// Returns the names of tables this table references.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().filter_map(|c| match c {
            ConstraintDefinition::Reference { table, .. } => Some(table.as_str()),
            _ => None,
        })
    }

    /// Returns declared constraints plus one unique constraint for every
    /// column flagged `unique` that no declared constraint already covers.
    #[must_use]
    pub fn effective_constraints(&self) -> Vec<ConstraintDefinition> {
        let mut constraints = self.constraints.clone();
        for column in self.columns.iter().filter(|c| c.unique && !c.primary) {
            let covered = self.constraints.iter().any(|c| {
                matches!(c, ConstraintDefinition::Unique { columns }
                    if columns.len() == 1 && columns[0] == column.name)
            });
            if !covered {
                constraints.push(ConstraintDefinition::Unique {
                    columns: vec![column.name.clone()],
                });
            }
        }
        constraints
    }
}

// The server would silently truncate these, and the catalog would then
// never match the declaration.
fn check_identifier(name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::IdentifierTooLong(name.to_string()));
    }
    Ok(())
}

/// A validated set of tables with a dependency-respecting processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableDefinition>,
    order: Vec<usize>,
}

impl Schema {
    /// Validates the tables and derives their processing order.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate or over-long table and column names,
    /// or when reference constraints form a cycle.
    pub fn new(tables: Vec<TableDefinition>) -> Result<Self> {
        let mut table_names = HashSet::new();
        for table in &tables {
            check_identifier(&table.name)?;
            if !table_names.insert(table.name.as_str()) {
                return Err(Error::DuplicateTable(table.name.clone()));
            }
            let mut column_names = HashSet::new();
            for column in &table.columns {
                check_identifier(&column.name)?;
                if !column_names.insert(column.name.as_str()) {
                    return Err(Error::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }

        let order = processing_order(&tables)?;
        Ok(Self { tables, order })
    }

    /// Parses a schema from a JSON array of tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the schema is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let tables: Vec<TableDefinition> = serde_json::from_str(json)?;
        Self::new(tables)
    }

    /// Reads a schema from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::SchemaFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Serializes the declared tables as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.tables)?)
    }

    /// Returns tables in processing order: every table comes after the
    /// tables it references.
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.order.iter().map(|&i| &self.tables[i])
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns the column a reference to `table` points at when none is
    /// given: the table's primary key, or `id` for tables outside the schema.
    #[must_use]
    pub fn default_target_column(&self, table: &str) -> &str {
        self.get_table(table)
            .and_then(TableDefinition::primary_key)
            .unwrap_or("id")
    }

    /// Returns the number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if the schema has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Orders tables so that referenced tables come first.
///
/// Among tables whose dependencies are satisfied the earliest declared one is
/// picked, so an already well-ordered declaration is kept as is.
fn processing_order(tables: &[TableDefinition]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.as_str(), i))
        .collect();

    let deps: Vec<Vec<usize>> = tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let mut deps: Vec<usize> = table
                .referenced_tables()
                .filter_map(|name| index.get(name).copied())
                .filter(|&j| j != i)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect();

    let mut placed = vec![false; tables.len()];
    let mut order = Vec::with_capacity(tables.len());
    while order.len() < tables.len() {
        let next = (0..tables.len()).find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => return Err(Error::ReferenceCycle(find_cycle(tables, &deps, &placed))),
        }
    }
    Ok(order)
}

/// Walks unplaced dependencies until a table repeats.
///
/// Every unplaced table has at least one unplaced dependency, otherwise it
/// would have been placed, so the walk always closes a loop.
fn find_cycle(tables: &[TableDefinition], deps: &[Vec<usize>], placed: &[bool]) -> Vec<String> {
    let Some(start) = placed.iter().position(|p| !p) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    while let Some(&next) = deps[current].iter().find(|&&d| !placed[d]) {
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&i| tables[i].name.clone())
                .collect();
            cycle.push(tables[next].name.clone());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.iter().map(|&i| tables[i].name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_ref(name: &str, target: &str) -> TableDefinition {
        TableDefinition::new(name)
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .column(ColumnDefinition::new("parent_id", ColumnType::Integer))
            .constraint(ConstraintDefinition::reference("parent_id", target, false))
    }

    fn names(schema: &Schema) -> Vec<&str> {
        schema.tables().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_column_builder() {
        let col = ColumnDefinition::new("id", ColumnType::Serial).primary_key();
        assert!(col.primary);
        assert!(!col.nullable);
        assert!(col.is_not_null());

        let col = ColumnDefinition::new("name", ColumnType::Varchar);
        assert!(col.nullable);
        assert!(!col.is_not_null());
    }

    #[test]
    fn test_primary_key_is_not_null_even_if_declared_nullable() {
        let col = ColumnDefinition::new("id", ColumnType::Serial)
            .primary_key()
            .nullable();
        assert!(col.nullable);
        assert!(col.is_not_null());
    }

    #[test]
    fn test_effective_char_limit() {
        assert_eq!(
            ColumnDefinition::new("a", ColumnType::Varchar).effective_char_limit(),
            Some(255)
        );
        assert_eq!(
            ColumnDefinition::new("a", ColumnType::Char)
                .char_limit(2)
                .effective_char_limit(),
            Some(2)
        );
        assert_eq!(
            ColumnDefinition::new("a", ColumnType::Text)
                .char_limit(10)
                .effective_char_limit(),
            None
        );
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::Bool(true).to_sql(), "TRUE");
        assert_eq!(DefaultValue::Bool(false).to_sql(), "FALSE");
        assert_eq!(DefaultValue::Now.to_sql(), "NOW()");
        assert_eq!(DefaultValue::literal(0).to_sql(), "0");
        assert_eq!(DefaultValue::literal("'guest'").to_sql(), "'guest'");
    }

    #[test]
    fn test_column_type_names() {
        assert_eq!(ColumnType::Serial.sql_name(), "SERIAL");
        assert_eq!(ColumnType::Serial.catalog_name(), "integer");
        assert_eq!(ColumnType::Varchar.catalog_name(), "character varying");
        assert_eq!(
            ColumnType::Timestamp.catalog_name(),
            "timestamp without time zone"
        );
        assert!(ColumnType::Char.is_bounded_text());
        assert!(!ColumnType::Text.is_bounded_text());
    }

    #[test]
    fn test_effective_constraints_merge_unique_flags() {
        let table = TableDefinition::new("users")
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key().unique())
            .column(ColumnDefinition::new("email", ColumnType::Varchar).unique())
            .column(ColumnDefinition::new("handle", ColumnType::Varchar).unique())
            .constraint(ConstraintDefinition::unique(&["email"]));

        let constraints = table.effective_constraints();
        assert_eq!(
            constraints,
            vec![
                ConstraintDefinition::unique(&["email"]),
                ConstraintDefinition::unique(&["handle"]),
            ]
        );
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let err = Schema::new(vec![TableDefinition::new("a"), TableDefinition::new("a")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTable(name) if name == "a"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let table = TableDefinition::new("a")
            .column(ColumnDefinition::new("x", ColumnType::Text))
            .column(ColumnDefinition::new("x", ColumnType::Integer));
        let err = Schema::new(vec![table]).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateColumn { table, column } if table == "a" && column == "x"
        ));
    }

    #[test]
    fn test_declared_order_kept_when_valid() {
        let schema = Schema::new(vec![
            TableDefinition::new("users"),
            table_with_ref("links", "users"),
            table_with_ref("clicks", "links"),
        ])
        .unwrap();
        assert_eq!(names(&schema), vec!["users", "links", "clicks"]);
    }

    #[test]
    fn test_overlong_identifiers_rejected() {
        let long = "x".repeat(64);
        let err = Schema::new(vec![TableDefinition::new(&long)]).unwrap_err();
        assert!(matches!(err, Error::IdentifierTooLong(ref name) if *name == long));

        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new(&long, ColumnType::Text));
        let err = Schema::new(vec![table]).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Identifier '{long}' is longer than 63 bytes")
        );

        let fits = TableDefinition::new("x".repeat(63));
        assert!(Schema::new(vec![fits]).is_ok());
    }

    #[test]
    fn test_misordered_declaration_is_sorted() {
        let schema = Schema::new(vec![
            table_with_ref("clicks", "links"),
            table_with_ref("links", "users"),
            TableDefinition::new("users"),
            TableDefinition::new("settings"),
        ])
        .unwrap();
        assert_eq!(names(&schema), vec!["users", "links", "clicks", "settings"]);
    }

    #[test]
    fn test_self_and_external_references_ignored() {
        let schema = Schema::new(vec![
            table_with_ref("comments", "comments"),
            table_with_ref("audit", "elsewhere"),
        ])
        .unwrap();
        assert_eq!(names(&schema), vec!["comments", "audit"]);
    }

    #[test]
    fn test_cycle_detected() {
        let err = Schema::new(vec![
            TableDefinition::new("root"),
            table_with_ref("a", "b"),
            table_with_ref("b", "c"),
            table_with_ref("c", "a"),
        ])
        .unwrap_err();
        match err {
            Error::ReferenceCycle(cycle) => assert_eq!(cycle, vec!["a", "b", "c", "a"]),
            other => panic!("Expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_default_target_column() {
        let schema = Schema::new(vec![
            TableDefinition::new("users")
                .column(ColumnDefinition::new("user_id", ColumnType::Serial).primary_key()),
            TableDefinition::new("tags"),
        ])
        .unwrap();
        assert_eq!(schema.default_target_column("users"), "user_id");
        assert_eq!(schema.default_target_column("tags"), "id");
        assert_eq!(schema.default_target_column("missing"), "id");
    }

    #[test]
    fn test_json_round_trip_keeps_defaults() {
        let json = r#"[
            {
                "name": "users",
                "columns": [
                    {"name": "id", "type": "serial", "primary": true, "nullable": false},
                    {"name": "email", "type": "varchar", "char_limit": 255, "nullable": false},
                    {"name": "active", "type": "boolean", "default": {"bool": true}},
                    {"name": "created_at", "type": "timestamp", "default": "now"}
                ],
                "constraints": [
                    {"type": "unique_lower", "columns": ["email"]},
                    {"type": "check", "predicate": "length(email) > 3"}
                ],
                "indexes": [["created_at"]]
            },
            {
                "name": "links",
                "columns": [{"name": "user_id", "type": "integer"}],
                "constraints": [{"type": "reference", "column": "user_id", "table": "users", "cascade": true}]
            }
        ]"#;

        let schema = Schema::from_json(json).unwrap();
        let users = schema.get_table("users").unwrap();
        assert_eq!(users.columns.len(), 4);
        assert!(users.get_column("active").unwrap().nullable);
        assert_eq!(
            users.get_column("created_at").unwrap().default,
            Some(DefaultValue::Now)
        );
        assert_eq!(
            schema.get_table("links").unwrap().constraints[0],
            ConstraintDefinition::reference("user_id", "users", true)
        );

        let reparsed = Schema::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, schema);
    }
}
