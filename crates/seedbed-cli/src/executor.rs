use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};

use crate::config::ApplyConfig;
use crate::errors::CliResult;

/// Outcome of running a statement batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    pub statements: usize,
    pub rows_affected: u64,
    pub committed: bool,
    pub duration_ms: u64,
}

/// Runs emitted statements in order.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Execute every statement in one unit of work, stopping at the first
    /// failure.
    async fn execute(&self, statements: &[String]) -> CliResult<ExecutionSummary>;
}

/// Executes statements sequentially inside one Postgres transaction.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(conn: &str, config: &ApplyConfig) -> CliResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(conn)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PostgresExecutor {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn execute(&self, statements: &[String]) -> CliResult<ExecutionSummary> {
        let timer = Instant::now();
        let mut tx = self.pool.begin().await?;
        let mut rows_affected = 0;

        for (index, sql) in statements.iter().enumerate() {
            match sqlx::query(sql).execute(&mut *tx).await {
                Ok(result) => {
                    rows_affected += result.rows_affected();
                    debug!(index, rows = result.rows_affected(), "statement executed");
                }
                Err(err) => {
                    warn!(index, error = %err, "statement failed, rolling back");
                    if let Err(rollback) = tx.rollback().await {
                        warn!(error = %rollback, "rollback failed");
                    }
                    return Err(err.into());
                }
            }
        }

        tx.commit().await?;
        let summary = ExecutionSummary {
            statements: statements.len(),
            rows_affected,
            committed: true,
            duration_ms: timer.elapsed().as_millis() as u64,
        };
        info!(
            statements = summary.statements,
            rows_affected = summary.rows_affected,
            duration_ms = summary.duration_ms,
            "transaction committed"
        );
        Ok(summary)
    }
}

/// Logs statements without touching a database.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    fn engine(&self) -> &'static str {
        "dry-run"
    }

    async fn execute(&self, statements: &[String]) -> CliResult<ExecutionSummary> {
        for (index, sql) in statements.iter().enumerate() {
            info!(index, sql = %sql, "dry run");
        }
        Ok(ExecutionSummary {
            statements: statements.len(),
            ..ExecutionSummary::default()
        })
    }
}
