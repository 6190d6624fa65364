//! Transactional SQL execution against the warehouse.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use sqlx::{Executor as _, PgConnection, PgPool, Postgres};
use tracing::{debug, info, warn};

use permafrost_core::{Error, Result, WarehouseExecutor};

/// Executes raw SQL over a dedicated pooled connection.
///
/// Statements are run through the simple query protocol (`raw_sql`) so a
/// single entry may itself contain multiple `;`-separated statements, as
/// the extracted DDL artifact does.
pub struct PgWarehouseExecutor {
    pool: PgPool,
}

impl PgWarehouseExecutor {
    /// Create a new executor over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Routes the `Executor` call through a non-async fn so the trait methods'
// generated futures only hold the already-boxed `Send` future. Calling
// `raw_sql(..).execute(&mut *conn)` directly inside an `async_trait` body
// trips rustc's "implementation of `Executor` is not general enough"
// higher-ranked lifetime limitation.
fn run_raw_sql<'a>(
    conn: &'a mut PgConnection,
    sql: &'a str,
) -> Pin<Box<dyn Future<Output = sqlx::Result<PgQueryResult>> + Send + 'a>> {
    conn.execute(sqlx::raw_sql(sql))
}

#[async_trait]
impl WarehouseExecutor for PgWarehouseExecutor {
    async fn execute(&self, sql: &str) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;

        run_raw_sql(&mut conn, sql).await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "executor",
            op = "execute",
            duration_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(())
    }

    async fn execute_transaction(&self, statements: &[String]) -> Result<()> {
        let start = Instant::now();
        // The transaction holds one dedicated connection until commit or
        // rollback; dropping `tx` on any error path rolls back.
        let mut tx: sqlx::Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(Error::Database)?;

        for statement in statements {
            if let Err(e) = run_raw_sql(&mut tx, statement).await {
                warn!(
                    subsystem = "db",
                    component = "executor",
                    op = "transaction",
                    statement_count = statements.len(),
                    error = %e,
                    "Batch failed, rolling back"
                );
                return Err(Error::Database(e));
            }
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "executor",
            op = "transaction",
            statement_count = statements.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch committed"
        );
        Ok(())
    }
}
