//! In-memory connection source.
//!
//! [`MemorySource`] keeps a catalog in memory and applies typed statements to
//! it with the same rules PostgreSQL enforces for the shapes the engine emits:
//! guarded creations are no-ops when the object exists, constraint names are
//! unique per table, foreign keys need an existing unique target, and so on.
//! It also records every statement sessions execute, can be told to fail
//! statements or catalog reads, and counts sessions handed out and returned.
//! Constraint and index names longer than PostgreSQL keeps are truncated the
//! way the server truncates them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::{ColumnInfo, ConstraintInfo, ConstraintKind, IndexInfo};
use crate::error::{Error, Result};
use crate::source::{ConnectionSource, Session};
use crate::statement::{ConstraintBody, IndexKey, IndexSpec, Statement, truncate_identifier};

type StatementFilter = Arc<dyn Fn(&Statement) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: Vec<ColumnInfo>,
    constraints: Vec<ConstraintInfo>,
    indexes: Vec<IndexInfo>,
    /// Columns holding NULL values.
    nulls: HashSet<String>,
}

impl MemTable {
    fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn has_key_on(&self, column: &str) -> bool {
        let primary = format!("PRIMARY KEY ({column})");
        let unique = format!("UNIQUE ({column})");
        self.constraints
            .iter()
            .any(|c| c.definition == primary || c.definition == unique)
    }
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    executed: Vec<Statement>,
    seeds: Vec<String>,
    failing_statements: Vec<StatementFilter>,
    failing_catalog: HashSet<String>,
    fail_acquire: bool,
    acquired: usize,
    released: usize,
}

impl State {
    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::Rejected(format!("relation \"{name}\" does not exist")))
    }

    fn index_exists(&self, name: &str) -> bool {
        self.tables
            .values()
            .any(|t| t.indexes.iter().any(|i| i.name == name))
    }

    fn apply(&mut self, statement: &Statement) -> Result<u64> {
        match statement {
            Statement::CreateShell { table } => {
                self.tables.entry(table.clone()).or_default();
                Ok(0)
            }
            Statement::AddColumn { table, column } => {
                let mem = self.table_mut(table)?;
                if mem.column(&column.name).is_some() {
                    return Ok(0);
                }
                if column.primary {
                    if mem
                        .constraints
                        .iter()
                        .any(|c| c.kind == ConstraintKind::PrimaryKey)
                    {
                        return Err(Error::Rejected(format!(
                            "multiple primary keys for table \"{table}\" are not allowed"
                        )));
                    }
                    let name = format!("{table}_pkey");
                    mem.constraints.push(ConstraintInfo {
                        name: name.clone(),
                        kind: ConstraintKind::PrimaryKey,
                        definition: format!("PRIMARY KEY ({})", column.name),
                    });
                    mem.indexes.push(IndexInfo {
                        definition: format!(
                            "CREATE UNIQUE INDEX {name} ON public.{table} USING btree ({})",
                            column.name
                        ),
                        name,
                    });
                }
                mem.columns.push(ColumnInfo {
                    name: column.name.clone(),
                    data_type: column.column_type.catalog_name().to_string(),
                    max_length: column
                        .effective_char_limit()
                        .and_then(|l| i32::try_from(l).ok()),
                    nullable: !column.is_not_null(),
                });
                Ok(0)
            }
            Statement::SetNotNull { table, column } => {
                let mem = self.table_mut(table)?;
                if mem.nulls.contains(column) {
                    return Err(Error::Rejected(format!(
                        "column \"{column}\" of relation \"{table}\" contains null values"
                    )));
                }
                let live = mem
                    .columns
                    .iter_mut()
                    .find(|c| &c.name == column)
                    .ok_or_else(|| {
                        Error::Rejected(format!(
                            "column \"{column}\" of relation \"{table}\" does not exist"
                        ))
                    })?;
                live.nullable = false;
                Ok(0)
            }
            Statement::AddConstraint { table, name, body } => {
                self.add_constraint(table, name, body)
            }
            Statement::DropConstraint { table, name } => {
                let stored = truncate_identifier(name.clone());
                let mem = self.table_mut(table)?;
                let position = mem
                    .constraints
                    .iter()
                    .position(|c| c.name == stored)
                    .ok_or_else(|| {
                        Error::Rejected(format!(
                            "constraint \"{name}\" of relation \"{table}\" does not exist"
                        ))
                    })?;
                let dropped = mem.constraints.remove(position);
                if matches!(dropped.kind, ConstraintKind::Unique | ConstraintKind::PrimaryKey) {
                    mem.indexes.retain(|i| i.name != dropped.name);
                }
                Ok(0)
            }
            Statement::CreateIndex { table, index } => {
                let name = truncate_identifier(index.name.clone());
                if self.index_exists(&name) {
                    return Ok(0);
                }
                let mem = self.table_mut(table)?;
                for key in &index.keys {
                    if mem.column(key.column()).is_none() {
                        return Err(Error::Rejected(format!(
                            "column \"{}\" does not exist",
                            key.column()
                        )));
                    }
                }
                mem.indexes.push(IndexInfo {
                    definition: index_definition(&name, table, index),
                    name,
                });
                Ok(0)
            }
            Statement::Seed { sql } => {
                self.seeds.push(sql.clone());
                Ok(1)
            }
        }
    }

    fn add_constraint(&mut self, table: &str, name: &str, body: &ConstraintBody) -> Result<u64> {
        let name = truncate_identifier(name.to_string());
        let definition = match body {
            ConstraintBody::ForeignKey {
                column,
                target_table,
                target_column,
                cascade,
            } => {
                let target = self.tables.get(target_table).ok_or_else(|| {
                    Error::Rejected(format!("relation \"{target_table}\" does not exist"))
                })?;
                if target.column(target_column).is_none() {
                    return Err(Error::Rejected(format!(
                        "column \"{target_column}\" referenced in foreign key constraint does not exist"
                    )));
                }
                if !target.has_key_on(target_column) {
                    return Err(Error::Rejected(format!(
                        "there is no unique constraint matching given keys for referenced table \"{target_table}\""
                    )));
                }
                let mut definition =
                    format!("FOREIGN KEY ({column}) REFERENCES {target_table}({target_column})");
                if *cascade {
                    definition.push_str(" ON DELETE CASCADE");
                }
                definition
            }
            ConstraintBody::Unique { columns } => format!("UNIQUE ({})", columns.join(", ")),
            ConstraintBody::Check { predicate } => format!("CHECK (({predicate}))"),
        };

        let mem = self.table_mut(table)?;
        if mem.constraints.iter().any(|c| c.name == name) {
            return Err(Error::Rejected(format!(
                "constraint \"{name}\" for relation \"{table}\" already exists"
            )));
        }
        let columns: Vec<&str> = match body {
            ConstraintBody::ForeignKey { column, .. } => vec![column.as_str()],
            ConstraintBody::Unique { columns } => columns.iter().map(String::as_str).collect(),
            ConstraintBody::Check { .. } => Vec::new(),
        };
        for column in columns {
            if mem.column(column).is_none() {
                return Err(Error::Rejected(format!(
                    "column \"{column}\" named in key does not exist"
                )));
            }
        }

        let kind = match body {
            ConstraintBody::ForeignKey { .. } => ConstraintKind::ForeignKey,
            ConstraintBody::Unique { .. } => ConstraintKind::Unique,
            ConstraintBody::Check { .. } => ConstraintKind::Check,
        };
        if kind == ConstraintKind::Unique {
            mem.indexes.push(IndexInfo {
                name: name.clone(),
                definition: format!(
                    "CREATE UNIQUE INDEX {name} ON public.{table} USING btree ({})",
                    definition.trim_start_matches("UNIQUE (").trim_end_matches(')')
                ),
            });
        }
        mem.constraints.push(ConstraintInfo {
            name,
            kind,
            definition,
        });
        Ok(0)
    }
}

fn index_definition(name: &str, table: &str, index: &IndexSpec) -> String {
    let keys: Vec<String> = index
        .keys
        .iter()
        .map(|k| match k {
            IndexKey::Column(c) => c.clone(),
            IndexKey::Lower(c) => format!("lower(({c})::text)"),
        })
        .collect();
    format!(
        "CREATE {}INDEX {} ON public.{table} USING btree ({})",
        if index.unique { "UNIQUE " } else { "" },
        name,
        keys.join(", ")
    )
}

/// Connection source over an in-memory catalog.
///
/// Clones share the same catalog.
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemorySource")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("executed", &state.executed.len())
            .field("acquired", &state.acquired)
            .field("released", &state.released)
            .finish()
    }
}

impl MemorySource {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a statement directly to the catalog.
    ///
    /// Used to prepare an existing database. Nothing is recorded and no
    /// failure filter applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] when PostgreSQL would refuse the statement.
    pub fn apply(&self, statement: &Statement) -> Result<u64> {
        self.lock().apply(statement)
    }

    /// Makes sessions fail every statement matching `filter`.
    pub fn fail_statements_where<F>(&self, filter: F)
    where
        F: Fn(&Statement) -> bool + Send + Sync + 'static,
    {
        self.lock().failing_statements.push(Arc::new(filter));
    }

    /// Makes catalog reads for `table` fail.
    pub fn fail_catalog_reads(&self, table: impl Into<String>) {
        self.lock().failing_catalog.insert(table.into());
    }

    /// Makes `acquire` fail while `enabled` is set.
    pub fn fail_acquire(&self, enabled: bool) {
        self.lock().fail_acquire = enabled;
    }

    /// Marks `column` of `table` as holding NULL values.
    pub fn insert_nulls(&self, table: &str, column: &str) {
        let mut state = self.lock();
        if let Some(mem) = state.tables.get_mut(table) {
            mem.nulls.insert(column.to_string());
        }
    }

    /// Returns every statement executed through a session, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<Statement> {
        self.lock().executed.clone()
    }

    /// Returns the SQL text of every executed statement.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.lock().executed.iter().map(Statement::to_sql).collect()
    }

    /// Forgets executed statements.
    pub fn clear_executed(&self) {
        self.lock().executed.clear();
    }

    /// Returns seed statements that ran successfully.
    #[must_use]
    pub fn seeds(&self) -> Vec<String> {
        self.lock().seeds.clone()
    }

    /// Returns the number of sessions handed out.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    /// Returns the number of sessions returned.
    #[must_use]
    pub fn released(&self) -> usize {
        self.lock().released
    }

    /// Returns whether `table` exists.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// Returns the names of all tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    /// Returns a live column.
    #[must_use]
    pub fn column(&self, table: &str, column: &str) -> Option<ColumnInfo> {
        self.lock()
            .tables
            .get(table)
            .and_then(|t| t.column(column).cloned())
    }

    /// Returns the live column names of `table` in ordinal order.
    #[must_use]
    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns a live constraint.
    #[must_use]
    pub fn constraint(&self, table: &str, name: &str) -> Option<ConstraintInfo> {
        self.lock()
            .tables
            .get(table)
            .and_then(|t| t.constraints.iter().find(|c| c.name == name).cloned())
    }

    /// Returns the live constraint names of `table`, sorted.
    #[must_use]
    pub fn constraint_names(&self, table: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .tables
            .get(table)
            .map(|t| t.constraints.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Returns the live index names of `table`, sorted.
    #[must_use]
    pub fn index_names(&self, table: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .tables
            .get(table)
            .map(|t| t.indexes.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl ConnectionSource for MemorySource {
    type Session = MemorySession;

    async fn acquire(&self) -> Result<MemorySession> {
        let mut state = self.lock();
        if state.fail_acquire {
            return Err(Error::Acquire(sqlx::Error::PoolTimedOut));
        }
        state.acquired += 1;
        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session over a [`MemorySource`]. Counted as released on drop.
pub struct MemorySession {
    state: Arc<Mutex<State>>,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, table: &str, read: impl FnOnce(&MemTable) -> Vec<T>) -> Result<Vec<T>> {
        let state = self.lock();
        if state.failing_catalog.contains(table) {
            return Err(Error::Rejected(format!(
                "catalog read for \"{table}\" failed"
            )));
        }
        Ok(state.tables.get(table).map(read).unwrap_or_default())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.lock().released += 1;
    }
}

impl Session for MemorySession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let mut state = self.lock();
        state.executed.push(statement.clone());
        if state.failing_statements.iter().any(|f| f(statement)) {
            return Err(Error::Rejected(format!(
                "statement failed: {}",
                statement.to_sql()
            )));
        }
        state.apply(statement)
    }

    async fn fetch_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.read(table, |t| t.columns.clone())
    }

    async fn fetch_constraints(&mut self, table: &str) -> Result<Vec<ConstraintInfo>> {
        self.read(table, |t| t.constraints.clone())
    }

    async fn fetch_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        self.read(table, |t| t.indexes.clone())
    }
}
