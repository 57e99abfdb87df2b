//! HTTP control surface
//!
//! Thin JSON layer over [`ControlHandle`]; every mutation goes through the
//! runner's command channel, so requests never race a tick evaluation.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signal_engine::{instrument, CandidateSignal, EngineError, InstrumentConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::journal::{Journal, LogKind, LogSummary};
use crate::notify::{ChannelStatus, DeliveryReport};
use crate::runner::{BotStatus, ControlError, ControlHandle, FeedStatus, FilterStatsView};

const DEFAULT_SIGNALS_LIMIT: usize = 20;
const DEFAULT_LOGS_LIMIT: usize = 50;
const MAX_LOGS_LIMIT: usize = 500;

pub struct AppState {
    pub control: ControlHandle,
    pub journal: Journal,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/signals", get(signals))
        .route("/instruments", get(instruments))
        .route("/instrument", post(switch_instrument))
        .route("/notifiers", post(set_notifier))
        .route("/notifiers/test", post(test_notifiers))
        .route("/filter/stats", get(filter_stats))
        .route("/filter/stats/reset", post(reset_filter_stats))
        .route("/logs/summary", get(logs_summary))
        .route("/logs/recent", get(logs_recent));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn control_error(e: ControlError) -> (StatusCode, String) {
    let status = match &e {
        ControlError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::Engine(EngineError::InvalidInstrument(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn journal_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("Journal read failed: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

async fn start(State(state): State<Arc<AppState>>) -> ApiResult<BotStatus> {
    state.control.start().await.map(Json).map_err(control_error)
}

async fn stop(State(state): State<Arc<AppState>>) -> ApiResult<BotStatus> {
    state.control.stop().await.map(Json).map_err(control_error)
}

async fn status(State(state): State<Arc<AppState>>) -> ApiResult<BotStatus> {
    state.control.status().await.map(Json).map_err(control_error)
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn signals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<CandidateSignal>> {
    let limit = query.limit.unwrap_or(DEFAULT_SIGNALS_LIMIT);
    state.control.signals(limit).await.map(Json).map_err(control_error)
}

async fn instruments() -> Json<Vec<InstrumentConfig>> {
    Json(instrument::all())
}

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    symbol: String,
}

async fn switch_instrument(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwitchRequest>,
) -> ApiResult<InstrumentConfig> {
    state
        .control
        .switch_instrument(&req.symbol)
        .await
        .map(Json)
        .map_err(control_error)
}

#[derive(Debug, Deserialize)]
struct NotifierToggle {
    channel: String,
    enabled: bool,
}

async fn set_notifier(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NotifierToggle>,
) -> ApiResult<Vec<ChannelStatus>> {
    let found = state
        .control
        .set_notifier(&req.channel, req.enabled)
        .await
        .map_err(control_error)?;
    if !found {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Unknown notifier: {}", req.channel),
        ));
    }
    let status = state.control.status().await.map_err(control_error)?;
    Ok(Json(status.notifiers))
}

async fn test_notifiers(State(state): State<Arc<AppState>>) -> ApiResult<Vec<DeliveryReport>> {
    state.control.test_notifiers().await.map(Json).map_err(control_error)
}

async fn filter_stats(State(state): State<Arc<AppState>>) -> ApiResult<FilterStatsView> {
    state.control.filter_stats().await.map(Json).map_err(control_error)
}

async fn reset_filter_stats(State(state): State<Arc<AppState>>) -> ApiResult<FilterStatsView> {
    state
        .control
        .reset_filter_stats()
        .await
        .map(Json)
        .map_err(control_error)
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    date: Option<NaiveDate>,
}

async fn logs_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<LogSummary> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    state.journal.summary(date).await.map(Json).map_err(journal_error)
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    #[serde(rename = "type")]
    kind: Option<LogKind>,
    limit: Option<usize>,
}

async fn logs_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Vec<serde_json::Value>> {
    let kind = query.kind.unwrap_or(LogKind::Signals);
    let limit = query.limit.unwrap_or(DEFAULT_LOGS_LIMIT).min(MAX_LOGS_LIMIT);
    state
        .journal
        .recent(kind, limit, Utc::now().date_naive())
        .await
        .map(Json)
        .map_err(journal_error)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    running: bool,
    symbol: String,
    feed: FeedStatus,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, StatusCode> {
    let status = state.control.status().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let healthy = !matches!(status.feed, FeedStatus::GaveUp { .. });
    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        running: status.session.running,
        symbol: status.session.symbol,
        feed: status.feed,
    }))
}
