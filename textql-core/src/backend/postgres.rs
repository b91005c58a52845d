//! PostgreSQL backend over a shared `sqlx` pool.
//!
//! The pool is built once at startup by [`connect_pool`] and every connection
//! it opens is configured for read-only use:
//!
//! - `default_transaction_read_only = on`, so a write that slips past the
//!   validator fails with SQLSTATE `25006`
//! - `statement_timeout` enforced by the server
//! - pre-ping on checkout (`test_before_acquire`) and recycling after
//!   `recycle` (`max_lifetime`)
//!
//! Connections are checked out per call and returned when the call (or the
//! row stream) ends.

use super::{convert, QueryBackend, RowStream};
use crate::error::QueryError;
use crate::types::Row;
use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Executor;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

/// Rows buffered between the driver task and the consumer.
const ROW_BUFFER: usize = 1000;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub pool_size: u32,
    /// Extra connections allowed above `pool_size` under load.
    pub max_overflow: u32,
    pub recycle: Duration,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 20,
            max_overflow: 10,
            recycle: Duration::from_secs(3600),
            acquire_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }
}

/// Opens the process-wide connection pool.
pub async fn connect_pool(settings: &PoolSettings) -> Result<PgPool, QueryError> {
    validate_connection_string(&settings.url)?;

    let statement_timeout_ms = settings.statement_timeout.as_millis();

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections())
        .acquire_timeout(settings.acquire_timeout)
        .max_lifetime(settings.recycle)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute("SET default_transaction_read_only = on")
                    .await?;
                let timeout = format!("SET statement_timeout = {statement_timeout_ms}");
                conn.execute(timeout.as_str()).await?;
                Ok(())
            })
        })
        .connect(&settings.url)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to PostgreSQL");
            QueryError::ExecutionFailure("failed to connect to database".to_string())
        })?;

    info!(
        max_connections = settings.max_connections(),
        statement_timeout_ms = statement_timeout_ms as u64,
        "PostgreSQL pool ready"
    );

    Ok(pool)
}

/// Validates a PostgreSQL connection string format
pub fn validate_connection_string(connection_string: &str) -> Result<(), QueryError> {
    if connection_string.is_empty() {
        return Err(QueryError::ExecutionFailure(
            "Connection string cannot be empty".to_string(),
        ));
    }

    if !connection_string.starts_with("postgres://")
        && !connection_string.starts_with("postgresql://")
    {
        return Err(QueryError::ExecutionFailure(
            "Connection string must start with 'postgresql://' or 'postgres://'".to_string(),
        ));
    }

    match url::Url::parse(connection_string) {
        Ok(url) if url.host_str().map_or(false, |host| !host.is_empty()) => Ok(()),
        Ok(_) => Err(QueryError::ExecutionFailure(
            "Connection string must include a host".to_string(),
        )),
        // Parse errors can echo credentials, keep them out of the message.
        Err(_) => Err(QueryError::ExecutionFailure(
            "Invalid connection string format".to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryBackend for PgBackend {
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(convert::row_to_json).collect()
    }

    fn stream_rows(&self, sql: String) -> RowStream {
        let pool = self.pool.clone();
        let (tx, rx) = mpsc::channel(ROW_BUFFER);

        tokio::spawn(async move {
            let mut conn = match pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            if forward_rows(&mut conn, &sql, &tx).await {
                // Closing the socket stops the server-side query instead of
                // draining it back into the pool.
                debug!("Row consumer went away, closing connection");
                if let Err(e) = conn.close().await {
                    debug!(error = %e, "Error while closing abandoned connection");
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }
}

/// Pushes converted rows into `tx`. Returns true when the consumer hung up early.
async fn forward_rows(
    conn: &mut PgConnection,
    sql: &str,
    tx: &mpsc::Sender<Result<Row, QueryError>>,
) -> bool {
    let mut rows = sqlx::query(sql).persistent(false).fetch(conn);

    loop {
        let next = tokio::select! {
            _ = tx.closed() => return true,
            next = rows.next() => next,
        };

        let Some(next) = next else {
            return false;
        };

        let item = next
            .map_err(QueryError::from)
            .and_then(|row| convert::row_to_json(&row));
        let failed = item.is_err();

        if tx.send(item).await.is_err() {
            return true;
        }
        if failed {
            return false;
        }
    }
}
