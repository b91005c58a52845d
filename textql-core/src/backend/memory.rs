//! In-memory backend for tests.
//!
//! Serves a fixed row set and honours the outer `LIMIT`/`OFFSET` of each
//! statement it receives, so pagination behaves as it would against a table
//! with a stable order. Checkouts, releases and pulled rows are counted so
//! tests can assert that abandoned streams hand their connection back.

use super::{QueryBackend, RowStream};
use crate::error::QueryError;
use crate::pagination;
use crate::types::Row;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Counters {
    checkouts: AtomicUsize,
    releases: AtomicUsize,
    rows_served: AtomicUsize,
}

/// Marks a checkout as released when dropped.
struct Checkout(Arc<Counters>);

impl Checkout {
    fn open(counters: &Arc<Counters>) -> Self {
        counters.checkouts.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Vec<Row>,
    failure: Option<QueryError>,
    executed: Mutex<Vec<String>>,
    counters: Arc<Counters>,
}

impl MemoryBackend {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// `count` rows of the form `{"id": n}` with `n` starting at 0.
    pub fn with_numbered_rows(count: usize) -> Self {
        let rows = (0..count)
            .map(|id| {
                let mut row = Row::new();
                row.insert("id".to_string(), Value::from(id as u64));
                row
            })
            .collect();
        Self::new(rows)
    }

    /// Every statement fails with `error`.
    pub fn failing(error: QueryError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn checkouts(&self) -> usize {
        self.counters.checkouts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn rows_served(&self) -> usize {
        self.counters.rows_served.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str) {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }
    }

    fn page(&self, sql: &str) -> Vec<Row> {
        let offset = pagination::extract_offset(sql).unwrap_or(0) as usize;
        let limit = pagination::extract_limit(sql).map_or(usize::MAX, |n| n as usize);
        self.rows.iter().skip(offset).take(limit).cloned().collect()
    }
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        self.record(sql);
        let _checkout = Checkout::open(&self.counters);

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let rows = self.page(sql);
        self.counters
            .rows_served
            .fetch_add(rows.len(), Ordering::SeqCst);
        Ok(rows)
    }

    fn stream_rows(&self, sql: String) -> RowStream {
        self.record(&sql);
        let checkout = Checkout::open(&self.counters);
        let counters = Arc::clone(&self.counters);

        let items: Vec<Result<Row, QueryError>> = match &self.failure {
            Some(error) => vec![Err(error.clone())],
            None => self.page(&sql).into_iter().map(Ok).collect(),
        };

        stream::iter(items)
            .map(move |item| {
                let _held = &checkout;
                if item.is_ok() {
                    counters.rows_served.fetch_add(1, Ordering::SeqCst);
                }
                item
            })
            .boxed()
    }
}
