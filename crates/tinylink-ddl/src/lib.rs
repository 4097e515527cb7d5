//! Idempotent schema reconciliation for PostgreSQL.
//!
//! `tinylink-ddl` takes a declarative description of tables and converges a
//! live database towards it without assuming the database starts empty and
//! without ever dropping data:
//! - Missing tables and columns are created; existing columns are never
//!   retyped or dropped
//! - Nullability is only ever tightened
//! - Constraints and indexes get deterministic names, so a second run finds
//!   everything in place and changes nothing
//! - A failing statement is logged and the run moves on
//!
//! # Architecture
//!
//! - **Schema** - Declared tables, columns, constraints, indexes and seeds,
//!   validated and ordered so referenced tables come first
//! - **Catalog** - Snapshots of the live columns, constraints and indexes
//! - **Statements** - Typed DDL rendered to PostgreSQL text in one place
//! - **Engine** - Runs the column, constraint, index and seed stages per table
//!   and collects a [`report::RunReport`]
//! - **Sources** - [`postgres::PgSource`] over an sqlx pool, and
//!   `memory::MemorySource` over an in-memory catalog (behind the `testing`
//!   feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use tinylink_ddl::prelude::*;
//!
//! let schema = Schema::new(vec![
//!     TableDefinition::new("users")
//!         .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
//!         .column(ColumnDefinition::new("email", ColumnType::Varchar).not_null().unique())
//!         .column(ColumnDefinition::new("name", ColumnType::Varchar).char_limit(100))
//!         .index(&["email"]),
//! ])?;
//!
//! let pool = PoolSettings::default().connect(&database_url).await?;
//! let report = reconcile(&PgSource::new(pool), &schema).await?;
//! assert!(report.success);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create whatever is missing
//! tinylink-ddl init
//!
//! # Drop and recreate foreign-key and unique constraints
//! tinylink-ddl fix-constraints
//!
//! # Show what would run
//! tinylink-ddl plan
//! ```

pub mod catalog;
mod columns;
mod constraints;
pub mod engine;
pub mod error;
mod indexes;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod postgres;
pub mod report;
pub mod schema;
mod seed;
pub mod source;
pub mod statement;
pub mod tinylink;

pub use engine::{Engine, ReconcileOptions, reconcile, reconcile_fixing_constraints};
pub use error::{Error, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{ColumnInfo, ConstraintInfo, ConstraintKind, IndexInfo};
    pub use crate::engine::{Engine, ReconcileOptions, reconcile, reconcile_fixing_constraints};
    pub use crate::error::{Error, Result};
    #[cfg(any(test, feature = "testing"))]
    pub use crate::memory::MemorySource;
    pub use crate::postgres::{PgSource, PoolSettings};
    pub use crate::report::{Outcome, RunReport, Stage, StepReport, Summary, TableReport};
    pub use crate::schema::{
        ColumnDefinition, ColumnType, ConstraintDefinition, DefaultValue, Schema,
        TableDefinition,
    };
    pub use crate::source::{ConnectionSource, Session};
    pub use crate::statement::Statement;
}
