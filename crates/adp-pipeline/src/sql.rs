//! SQL execution surface
//!
//! The enrichment and provisioning steps issue set-oriented statements
//! through this narrow interface instead of holding a pool directly, so the
//! statement shapes can be tested without a database.

use crate::error::Result;
use adp_common::TableRef;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

/// Narrow interface over the SQL engine.
pub trait SqlSurface {
    /// Execute a statement, returning the number of affected rows.
    fn execute(&self, sql: &str) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// True if `column` exists on `table`.
    fn column_exists(
        &self,
        table: &TableRef,
        column: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Postgres-backed SQL surface.
#[derive(Debug, Clone)]
pub struct PgSqlSurface {
    pool: PgPool,
}

impl PgSqlSurface {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool; stages are single-writer batch jobs.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SqlSurface for PgSqlSurface {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn column_exists(&self, table: &TableRef, column: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2 AND column_name = $3
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .bind(column)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("n")?;
        Ok(count > 0)
    }
}
