use crate::error::{ApiError, ApiResult};
use crate::models::{ClarificationResponse, QueryResponse, TextRequest};
use crate::state::AppState;
use actix_web::http::header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS};
use actix_web::web::{Bytes, Data, Json};
use actix_web::{post, HttpResponse};
use futures_util::{stream, StreamExt, TryStreamExt};
use textql_agents::{FormatDecision, Plan};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

fn question(request: &TextRequest) -> ApiResult<&str> {
    request
        .text
        .as_deref()
        .ok_or(ApiError::MissingField("text"))
}

fn clarification(decision: FormatDecision) -> HttpResponse {
    HttpResponse::Ok().json(ClarificationResponse {
        requires_clarification: true,
        content: decision.clarification_question.unwrap_or_default(),
        output_format: decision.output_format,
    })
}

/// Streams the result as newline-delimited JSON, one array per batch.
#[post("/process-text")]
pub async fn process_text(
    state: Data<AppState>,
    request: Json<TextRequest>,
) -> ApiResult<HttpResponse> {
    let question = question(&request)?;
    tracing::info!(question = %question, "Processing text request");

    let prepared = match state.agent.plan(question, &state.pipeline).await? {
        Plan::Clarification(decision) => return Ok(clarification(decision)),
        Plan::Ready { prepared, .. } => prepared,
    };

    let mut batches = state.pipeline.stream(&prepared)?;

    // Failures on the first fetch still get a proper status line.
    let first = batches.next().await.transpose()?;

    let body = stream::iter(first.map(Ok))
        .chain(batches)
        .map_err(ApiError::from)
        .and_then(|batch| async move {
            let line = batch.to_ndjson_line()?;
            Ok::<_, ApiError>(Bytes::from(line))
        })
        .inspect_err(|err| tracing::error!(error = %err, "Result stream aborted"));

    Ok(HttpResponse::Ok()
        .content_type(NDJSON_CONTENT_TYPE)
        .insert_header((X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(body))
}

/// Runs the question to completion and returns the bounded result.
#[post("/query")]
pub async fn query(state: Data<AppState>, request: Json<TextRequest>) -> ApiResult<HttpResponse> {
    let question = question(&request)?;
    tracing::info!(question = %question, "Processing query request");

    let (decision, prepared) = match state.agent.plan(question, &state.pipeline).await? {
        Plan::Clarification(decision) => return Ok(clarification(decision)),
        Plan::Ready { decision, prepared } => (decision, prepared),
    };

    let result = state.pipeline.materialize(&prepared).await?;
    tracing::info!(
        rows = result.row_count,
        truncated = result.truncated,
        elapsed_ms = result.execution_time_ms,
        "Query completed"
    );

    Ok(HttpResponse::Ok().json(QueryResponse {
        sql: prepared.sql().to_string(),
        output_format: decision.output_format,
        result,
    }))
}
