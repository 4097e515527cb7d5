//! Connection seam between the engine and a database.
//!
//! The engine never builds pools or loads credentials. It is handed a
//! [`ConnectionSource`] and acquires one [`Session`] per reconciliation stage.
//! A session is released by dropping it, which happens on every exit path
//! of a stage, including early returns through `?`.

#![allow(async_fn_in_trait)]

use crate::catalog::{ColumnInfo, ConstraintInfo, IndexInfo};
use crate::error::Result;
use crate::statement::Statement;

/// A pooled source of database sessions.
pub trait ConnectionSource {
    /// Session type handed out by this source.
    type Session: Session;

    /// Acquires a session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Acquire`] if no session can be obtained.
    async fn acquire(&self) -> Result<Self::Session>;
}

/// One checked-out connection.
pub trait Session {
    /// Renders `statement` as this session will execute it.
    fn render(&self, statement: &Statement) -> String {
        statement.to_sql()
    }

    /// Executes a single statement and returns the number of affected rows.
    ///
    /// Each statement commits on its own.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the database's message if the statement fails.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Lists the columns of `table` in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    async fn fetch_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Lists the constraints of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    async fn fetch_constraints(&mut self, table: &str) -> Result<Vec<ConstraintInfo>>;

    /// Lists the indexes of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    async fn fetch_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>>;
}
