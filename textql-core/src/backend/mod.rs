//! Data-store access behind the executor.
//!
//! [`QueryBackend`] is the seam between the executor and the pooled
//! connection: [`postgres::PgBackend`] runs statements on a `sqlx` pool,
//! `memory::MemoryBackend` (feature `testing`) serves fixed rows.
//! Backends hand back rows already normalized to JSON scalars.

use crate::error::QueryError;
use crate::types::Row;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub mod convert;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod postgres;

pub use postgres::{connect_pool, validate_connection_string, PgBackend, PoolSettings};

/// Row stream that owns its connection; dropping it releases the connection.
pub type RowStream = BoxStream<'static, Result<Row, QueryError>>;

#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Runs one statement on one checked-out connection and returns every row.
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, QueryError>;

    /// Runs one statement and yields rows as the data store produces them.
    fn stream_rows(&self, sql: String) -> RowStream;
}
