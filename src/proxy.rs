//! The task-status proxy endpoint.
//!
//! A stateless handler that translates `GET /task-status?jobId=...` into a
//! filtered read of the external task table and answers with the
//! normalized [`StatusReport`] contract. All retry policy lives in the
//! poller; this endpoint performs exactly one query per request.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::bitable::types::field_str;
use crate::bitable::{BitableClient, TableLocation, TokenCache, build_filter};
use crate::config::AppConfig;
use crate::error::StatusError;
use crate::status::{JobPhase, StatusReport};

/// Everything a request needs, shared across handlers.
///
/// The token cache lives here — owned by the composition root and injected,
/// so its coalescing discipline covers every concurrent request.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub client: Arc<BitableClient>,
    pub tokens: Arc<TokenCache>,
}

impl ProxyState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let client = Arc::new(BitableClient::new(
            config.app_id.clone(),
            config.app_secret.clone(),
        ));
        Self {
            config,
            client,
            tokens: Arc::new(TokenCache::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    #[serde(default, rename = "jobId")]
    job_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/task-status", get(task_status))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the proxy until ctrl-c.
pub async fn serve(state: ProxyState) -> anyhow::Result<()> {
    let bind = state.config.bind.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("task-status proxy listening on http://{bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn task_status(
    State(state): State<ProxyState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<StatusReport>, (StatusCode, Json<ErrorBody>)> {
    lookup_status(&state, params.job_id.as_deref())
        .await
        .map(Json)
        .map_err(reject)
}

fn reject(err: StatusError) -> (StatusCode, Json<ErrorBody>) {
    match &err {
        StatusError::MissingParameter => debug!("task-status called without a jobId"),
        other => error!("task-status lookup failed: {other}"),
    }
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.public_message().to_string(),
        }),
    )
}

async fn lookup_status(
    state: &ProxyState,
    job_id: Option<&str>,
) -> Result<StatusReport, StatusError> {
    let job_id = match job_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(StatusError::MissingParameter),
    };

    let config = &state.config;
    config.validate_store()?;
    let location = TableLocation::parse(&config.table_url)?;

    let filter = build_filter(&config.field_job_id, job_id);
    let records = state
        .client
        .query_records(&state.tokens, &location, &filter)
        .await?;

    if records.is_empty() {
        return Ok(StatusReport::not_found());
    }
    if records.len() > 1 {
        // At most one record should exist per job; pick the first
        // deterministically and flag the data problem.
        warn!("{} records match job {job_id}; using the first", records.len());
    }

    let record = &records[0];
    let fields = &record.fields;
    let reported_job_id =
        field_str(fields, &config.field_job_id).unwrap_or_else(|| job_id.to_string());
    let raw_status =
        field_str(fields, &config.field_status).unwrap_or_else(|| "pending".to_string());

    Ok(StatusReport {
        found: true,
        status: JobPhase::from_raw(&raw_status),
        record_id: Some(record.record_id.clone()),
        job_id: Some(reported_job_id),
        result: fields.get(&config.field_result).cloned(),
        created_time: record.created_time,
        last_modified_time: record.last_modified_time,
        message: None,
    })
}
