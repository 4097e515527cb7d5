//! PostgreSQL connection source backed by an sqlx pool.

use std::time::Duration;

use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::catalog::{ColumnInfo, ConstraintInfo, ConstraintKind, IndexInfo};
use crate::error::{Error, Result};
use crate::source::{ConnectionSource, Session};
use crate::statement::Statement;

const DEFAULT_NAMESPACE: &str = "public";

const COLUMNS_SQL: &str = r"
SELECT column_name::text, data_type::text, character_maximum_length::int4, is_nullable::text
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position
";

const CONSTRAINTS_SQL: &str = r"
SELECT con.conname::text, con.contype::text, pg_get_constraintdef(con.oid)
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class rel ON rel.oid = con.conrelid
INNER JOIN pg_catalog.pg_namespace nsp ON nsp.oid = rel.relnamespace
WHERE nsp.nspname = $1 AND rel.relname = $2
ORDER BY con.conname
";

const INDEXES_SQL: &str = r"
SELECT indexname::text, indexdef
FROM pg_catalog.pg_indexes
WHERE schemaname = $1 AND tablename = $2
ORDER BY indexname
";

/// Pool sizing used by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// How long `acquire` waits before failing.
    pub acquire_timeout: Duration,
    /// How long an idle connection is kept.
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolSettings {
    /// Returns pool options carrying these settings.
    #[must_use]
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(Some(self.idle_timeout))
    }

    /// Opens a pool and checks that one connection can be made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquire`] if the database is unreachable.
    pub async fn connect(&self, url: &str) -> Result<PgPool> {
        self.pool_options()
            .connect(url)
            .await
            .map_err(Error::Acquire)
    }
}

/// Hands out sessions from a [`PgPool`], scoped to one namespace.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
    namespace: String,
}

impl PgSource {
    /// Creates a source over `pool` for the `public` namespace.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Sets the namespace introspection is scoped to.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ConnectionSource for PgSource {
    type Session = PgSession;

    async fn acquire(&self) -> Result<PgSession> {
        let conn = self.pool.acquire().await.map_err(Error::Acquire)?;
        debug!(namespace = %self.namespace, idle = self.pool.num_idle(), "Acquired connection");
        Ok(PgSession {
            conn,
            namespace: self.namespace.clone(),
        })
    }
}

/// A pooled connection, returned to the pool on drop.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
    namespace: String,
}

impl Session for PgSession {
    /// Tables are always qualified, so DDL lands in the namespace the
    /// catalog reads look at whatever the role's `search_path` is.
    fn render(&self, statement: &Statement) -> String {
        statement.render(Some(&self.namespace))
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let sql = self.render(statement);
        // Simple-query protocol: DDL cannot take bind parameters.
        let result = sqlx::raw_sql(&sql).execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows: Vec<(String, String, Option<i32>, String)> = sqlx::query_as(COLUMNS_SQL)
            .bind(self.namespace.as_str())
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, max_length, is_nullable)| ColumnInfo {
                name,
                data_type,
                max_length,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
            })
            .collect())
    }

    async fn fetch_constraints(&mut self, table: &str) -> Result<Vec<ConstraintInfo>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(CONSTRAINTS_SQL)
            .bind(self.namespace.as_str())
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, code, definition)| ConstraintInfo {
                name,
                kind: ConstraintKind::from_code(&code),
                definition,
            })
            .collect())
    }

    async fn fetch_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows: Vec<(String, String)> = sqlx::query_as(INDEXES_SQL)
            .bind(self.namespace.as_str())
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, definition)| IndexInfo { name, definition })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_settings() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 20);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_acquire_error() {
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(1),
        };
        let pool = settings
            .pool_options()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let source = PgSource::new(pool).namespace("tinylink");
        assert_eq!(source.namespace, "tinylink");

        let err = source.acquire().await.err().unwrap();
        assert!(err.is_acquire());
    }
}
