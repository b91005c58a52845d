use super::*;
use crate::backend::memory::MemoryBackend;
use serde_json::json;

fn executor(backend: &Arc<MemoryBackend>, batch_size: usize, max_result_rows: usize) -> QueryExecutor {
    QueryExecutor::new(
        Arc::clone(backend) as Arc<dyn QueryBackend>,
        ExecutorSettings {
            batch_size,
            max_result_rows,
        },
    )
}

fn ids(rows: &[Row]) -> Vec<u64> {
    rows.iter()
        .map(|row| row["id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_explicit_limit_runs_verbatim() {
    let mut row = Row::new();
    row.insert("merchant_city".into(), json!("Shymkent"));
    row.insert("transaction_amount".into(), json!(1500.0));
    let backend = Arc::new(MemoryBackend::new(vec![row.clone(), row.clone(), row]));
    let exec = executor(&backend, 10_000, 10_000);

    let sql = "SELECT * FROM transactions WHERE merchant_city = 'Shymkent' LIMIT 1";
    let result = exec.execute_bounded(sql).await.unwrap();

    assert_eq!(result.row_count, 1);
    assert!(!result.truncated);
    assert_eq!(result.data[0]["merchant_city"], json!("Shymkent"));
    assert_eq!(backend.executed(), vec![sql.to_string()]);
}

#[tokio::test]
async fn test_verbatim_result_still_honours_cap() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(100));
    let exec = executor(&backend, 10, 20);

    let result = exec
        .execute_bounded("SELECT * FROM transactions LIMIT 50")
        .await
        .unwrap();

    assert_eq!(result.row_count, 20);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_verbatim_stops_pulling_after_cap() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(100_000));
    let exec = executor(&backend, 10, 20);

    let result = exec
        .execute_bounded("SELECT * FROM transactions ORDER BY id LIMIT 90000")
        .await
        .unwrap();

    assert_eq!(ids(&result.data), (0..20).collect::<Vec<_>>());
    assert!(result.truncated);
    // One row past the cap decides truncation; nothing beyond it is pulled.
    assert_eq!(backend.rows_served(), 21);
    assert_eq!(backend.checkouts(), 1);
    assert_eq!(backend.releases(), 1);
}

#[tokio::test]
async fn test_verbatim_at_exactly_cap_is_not_truncated() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(100));
    let exec = executor(&backend, 10, 20);

    let result = exec
        .execute_bounded("SELECT * FROM transactions LIMIT 20")
        .await
        .unwrap();

    assert_eq!(result.row_count, 20);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_paginated_fetch_stops_at_cap() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25_000));
    let exec = executor(&backend, 4_000, 10_000);

    let result = exec
        .execute_bounded("SELECT * FROM transactions ORDER BY id")
        .await
        .unwrap();

    assert_eq!(result.row_count, 10_000);
    assert_eq!(result.data.len(), 10_000);
    assert!(result.truncated);
    assert_eq!(ids(&result.data), (0..10_000).collect::<Vec<_>>());

    let executed = backend.executed();
    assert_eq!(executed.len(), 3);
    assert!(executed[0].ends_with("LIMIT 4000 OFFSET 0"));
    assert!(executed[1].ends_with("LIMIT 4000 OFFSET 4000"));
    assert!(executed[2].ends_with("LIMIT 4000 OFFSET 8000"));
}

#[tokio::test]
async fn test_default_settings_cap_large_tables() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25_000));
    let exec = QueryExecutor::new(
        Arc::clone(&backend) as Arc<dyn QueryBackend>,
        ExecutorSettings::default(),
    );

    let result = exec
        .execute_bounded("SELECT * FROM transactions")
        .await
        .unwrap();

    assert_eq!(result.row_count, 10_000);
    assert!(result.truncated);
    assert_eq!(backend.executed().len(), 1);
}

#[tokio::test]
async fn test_paginated_fetch_stops_when_source_runs_dry() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(2_500));
    let exec = executor(&backend, 1_000, 10_000);

    let result = exec
        .execute_bounded("SELECT * FROM transactions")
        .await
        .unwrap();

    assert_eq!(result.row_count, 2_500);
    assert!(!result.truncated);
    assert_eq!(backend.executed().len(), 3);
    assert_eq!(ids(&result.data), (0..2_500).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_exact_multiple_of_batch_needs_one_empty_page() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(2_000));
    let exec = executor(&backend, 1_000, 10_000);

    let result = exec
        .execute_bounded("SELECT * FROM transactions")
        .await
        .unwrap();

    assert_eq!(result.row_count, 2_000);
    assert!(!result.truncated);
    assert_eq!(backend.executed().len(), 3);
}

#[tokio::test]
async fn test_source_ending_exactly_at_cap_is_not_truncated() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25));
    let exec = executor(&backend, 10, 25);

    let result = exec
        .execute_bounded("SELECT * FROM transactions")
        .await
        .unwrap();

    assert_eq!(result.row_count, 25);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_bare_offset_is_where_paging_starts() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25));
    let exec = executor(&backend, 10, 100);

    let result = exec
        .execute_bounded("SELECT * FROM transactions OFFSET 5")
        .await
        .unwrap();

    assert_eq!(result.row_count, 20);
    assert_eq!(ids(&result.data), (5..25).collect::<Vec<_>>());
    assert!(backend.executed()[0].ends_with("LIMIT 10 OFFSET 5"));
}

#[tokio::test]
async fn test_non_read_statement_never_reaches_backend() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(5));
    let exec = executor(&backend, 10, 10);

    let err = exec.execute_bounded("DELETE FROM transactions").await.unwrap_err();
    assert_eq!(
        err,
        QueryError::InvalidQuery("Only SELECT queries are allowed".to_string())
    );
    assert!(exec.execute("UPDATE transactions SET x = 1").is_err());
    assert_eq!(backend.checkouts(), 0);
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let backend = Arc::new(MemoryBackend::failing(QueryError::InvalidQuery(
        "column \"nope\" does not exist".to_string(),
    )));
    let exec = executor(&backend, 10, 10);

    let err = exec
        .execute_bounded("SELECT nope FROM transactions")
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidQuery(_)));

    let mut batches = exec.execute("SELECT nope FROM transactions").unwrap();
    assert!(matches!(batches.next().await, Some(Err(QueryError::InvalidQuery(_)))));
    assert!(batches.next().await.is_none());
}

#[tokio::test]
async fn test_stream_batches_in_order() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25_000));
    let exec = executor(&backend, 10_000, 10_000);

    let batches: Vec<ResultBatch> = exec
        .execute("SELECT * FROM transactions")
        .unwrap()
        .map(|batch| batch.unwrap())
        .collect()
        .await;

    let sizes: Vec<usize> = batches.iter().map(ResultBatch::len).collect();
    assert_eq!(sizes, vec![10_000, 10_000, 5_000]);

    let all: Vec<Row> = batches.into_iter().flat_map(ResultBatch::into_rows).collect();
    assert_eq!(ids(&all), (0..25_000).collect::<Vec<_>>());
    assert_eq!(backend.executed(), vec!["SELECT * FROM transactions".to_string()]);
}

#[tokio::test]
async fn test_stream_of_empty_result_yields_nothing() {
    let backend = Arc::new(MemoryBackend::new(Vec::new()));
    let exec = executor(&backend, 100, 100);

    let mut batches = exec.execute("SELECT * FROM transactions").unwrap();
    assert!(batches.next().await.is_none());
    drop(batches);
    assert_eq!(backend.releases(), backend.checkouts());
}

#[tokio::test]
async fn test_dropping_stream_releases_connection() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(25));
    let exec = executor(&backend, 10, 10);

    let mut batches = exec.execute("SELECT * FROM transactions").unwrap();
    let first = batches.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(backend.releases(), 0);

    drop(batches);

    assert_eq!(backend.checkouts(), 1);
    assert_eq!(backend.releases(), 1);
    assert!(backend.rows_served() < 25);
}

#[tokio::test]
async fn test_stream_has_no_row_cap() {
    let backend = Arc::new(MemoryBackend::with_numbered_rows(30));
    let exec = executor(&backend, 7, 5);

    let total: usize = exec
        .execute("SELECT * FROM transactions")
        .unwrap()
        .map(|batch| batch.unwrap().len())
        .fold(0, |acc, n| async move { acc + n })
        .await;

    assert_eq!(total, 30);
}

#[tokio::test]
async fn test_error_mid_stream_follows_flushed_rows() {
    let rows: RowStream = stream::iter(vec![
        Ok(Row::new()),
        Ok(Row::new()),
        Err(QueryError::ExecutionFailure("statement timeout exceeded".into())),
        Ok(Row::new()),
    ])
    .boxed();

    let items: Vec<Result<ResultBatch, QueryError>> = into_batches(rows, 5).collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().len(), 2);
    assert!(matches!(items[1], Err(QueryError::ExecutionFailure(_))));
}
