//! HTTP route handlers for the kaf server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use super::metrics::Metrics;
use super::request::{put_payload_size, validate_log_name, ArchiveParams, GetParams};
use super::response::{encode_window, ApiError, LAST_MSG_SENT};
use crate::registry::{Registry, RESERVED_LOG};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub metrics: Arc<Metrics>,
}

/// Handle POST /put/{logname}
///
/// Appends the request body as one record and replies with the assigned
/// number as ASCII decimal. The log is created on first put.
pub async fn handle_put(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let name = validate_log_name(&name)?;
    if name == RESERVED_LOG {
        return Err(ApiError::bad_request("log name is reserved"));
    }

    let sz = put_payload_size(&headers)?;
    if body.len() as u64 != sz {
        return Err(ApiError::bad_request("failed reading message data"));
    }

    let log = state
        .registry
        .resolve(name, true)
        .await?
        .ok_or_else(|| ApiError::internal("log unavailable"))?;
    let num = log.put(body).await?;

    state.metrics.put_records_total.inc();
    state.metrics.put_bytes_total.inc_by(sz);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        num.to_string(),
    )
        .into_response())
}

/// Handle GET /get/{logname}?from=<num>&format=<kaf|raw|json>
///
/// Replies with the bounded window of records numbered `from` and up. An
/// unknown log is an empty window, not an error; the `X-Kaf-LastMsgSent`
/// header is only set when the window is non-empty.
pub async fn handle_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<GetParams>,
) -> Result<Response, ApiError> {
    let name = validate_log_name(&name)?;
    let from = params.from_num()?;
    let format = params.format();

    let msgs = match state.registry.resolve(name, false).await? {
        Some(log) => log.get(from).await?,
        None => Vec::new(),
    };

    state.metrics.get_records_total.inc_by(msgs.len() as u64);
    state
        .metrics
        .get_bytes_total
        .inc_by(msgs.iter().map(|m| m.data.len() as u64).sum());

    let body = encode_window(format, &msgs);
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    )
        .into_response();
    if let Some(last) = msgs.last() {
        response.headers_mut().insert(
            HeaderName::from_static(LAST_MSG_SENT),
            HeaderValue::from(last.num),
        );
    }
    Ok(response)
}

/// Handle POST /archive/{logname}?upto=<num>
///
/// Rotates the log, keeping records numbered strictly after `upto`. The
/// log must already exist.
pub async fn handle_archive(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ArchiveParams>,
) -> Result<Response, ApiError> {
    let name = validate_log_name(&name)?;
    let upto = params.upto()?;

    let log = state
        .registry
        .resolve(name, false)
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid log"))?;
    log.archive(upto).await?;

    state.metrics.archive_requests_total.inc();
    Ok(StatusCode::OK.into_response())
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> &'static str {
    "ok"
}
