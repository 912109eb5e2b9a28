//! REST handlers for the read surface and the admin config seam.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use argus_common::error::ArgusError;
use argus_common::query::{EventQuery, EventSort, SortOrder};
use argus_common::types::{EventStatus, ThresholdConfig};

use crate::AppState;

// --- Query structs ---

/// Raw query params for /api/events, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    pub search_query: Option<String>,
    pub since_timestamp: Option<String>,
    pub until_timestamp: Option<String>,
    pub min_magnitude: Option<f64>,
    pub min_confidence: Option<f64>,
    /// Comma-separated category list
    pub categories: Option<String>,
    /// Comma-separated source type list
    pub source_types: Option<String>,
    /// Comma-separated tag list
    pub tags: Option<String>,
    /// Comma-separated entity type list
    pub entity_types: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Map raw params onto a validated EventQuery. Every failure carries the
/// machine-readable reason surfaced in the 400 body.
pub fn parse_event_query(params: EventsParams) -> Result<EventQuery, ArgusError> {
    let mut query = EventQuery::default();

    query.search_query = params.search_query.filter(|s| !s.trim().is_empty());

    if let Some(raw) = params.since_timestamp {
        query.since_timestamp = Some(parse_timestamp(&raw, "since_timestamp")?);
    }
    if let Some(raw) = params.until_timestamp {
        query.until_timestamp = Some(parse_timestamp(&raw, "until_timestamp")?);
    }

    query.min_magnitude = params.min_magnitude;
    query.min_confidence = params.min_confidence;

    if let Some(raw) = params.categories {
        query.categories = parse_list(&raw)?;
    }
    if let Some(raw) = params.source_types {
        query.source_types = parse_list(&raw)?;
    }
    if let Some(raw) = params.entity_types {
        query.entity_types = parse_list(&raw)?;
    }
    if let Some(raw) = params.tags {
        query.tags = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(page) = params.page {
        query.page = page;
    }
    if let Some(limit) = params.limit {
        query.limit = limit;
    }
    if let Some(raw) = params.sort_by {
        query.sort_by = raw.parse::<EventSort>().map_err(ArgusError::Validation)?;
    }
    if let Some(raw) = params.sort_order {
        query.sort_order = raw.parse::<SortOrder>().map_err(ArgusError::Validation)?;
    }

    query.validate()?;
    Ok(query)
}

fn parse_timestamp(raw: &str, field: &str) -> Result<chrono::DateTime<chrono::Utc>, ArgusError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| ArgusError::Validation(format!("{field} is not an RFC 3339 timestamp")))
}

fn parse_list<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<Vec<T>, ArgusError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .collect::<Result<Vec<T>, String>>()
        .map_err(ArgusError::Validation)
}

fn invalid_query(err: ArgusError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "invalid_query",
            "message": err.reason(),
        })),
    )
}

fn store_error(e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    warn!(error = %e, "store error serving request");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "store_unavailable" })),
    )
}

// --- Handlers ---

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The public read path. Forces `status = published` whatever the caller
/// sends.
pub async fn api_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsParams>,
) -> impl IntoResponse {
    let mut query = match parse_event_query(params) {
        Ok(query) => query,
        Err(err) => return invalid_query(err).into_response(),
    };
    query.status = Some(EventStatus::Published);

    match state.store.query_events(&query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

pub async fn api_event_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_event(&id).await {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "not_found" })),
        )
            .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

pub async fn api_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

// --- Admin: thresholds ---

pub async fn get_thresholds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.get_thresholds().await {
        Ok(thresholds) => Json(thresholds).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ThresholdsBody {
    pub min_confidence: f64,
    pub min_magnitude: f64,
    pub max_source_age_hours: i64,
}

pub async fn put_thresholds(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ThresholdsBody>,
) -> impl IntoResponse {
    if !(0.0..=1.0).contains(&body.min_confidence) {
        return invalid_query(ArgusError::Validation(
            "min_confidence must be in [0, 1]".to_string(),
        ))
        .into_response();
    }
    if !(0.0..=10.0).contains(&body.min_magnitude) {
        return invalid_query(ArgusError::Validation(
            "min_magnitude must be in [0, 10]".to_string(),
        ))
        .into_response();
    }
    if body.max_source_age_hours < 0 {
        return invalid_query(ArgusError::Validation(
            "max_source_age_hours must be >= 0".to_string(),
        ))
        .into_response();
    }

    let thresholds = ThresholdConfig {
        min_confidence: body.min_confidence,
        min_magnitude: body.min_magnitude,
        max_source_age_hours: body.max_source_age_hours,
    };
    match state.store.set_thresholds(thresholds).await {
        Ok(()) => Json(thresholds).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

// --- Admin: tracked feeds ---

pub async fn list_feeds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_enabled_feeds().await {
        Ok(feeds) => Json(feeds).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddFeedBody {
    pub platform: String,
    pub account_identifier: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: i64,
}

fn default_fetch_interval() -> i64 {
    30
}

pub async fn add_feed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddFeedBody>,
) -> impl IntoResponse {
    if body.account_identifier.trim().is_empty() {
        return invalid_query(ArgusError::Validation(
            "account_identifier is required".to_string(),
        ))
        .into_response();
    }
    if body.fetch_interval_minutes < 1 {
        return invalid_query(ArgusError::Validation(
            "fetch_interval_minutes must be >= 1".to_string(),
        ))
        .into_response();
    }

    match state
        .store
        .add_tracked_feed(
            &body.platform,
            body.account_identifier.trim(),
            &body.display_name,
            body.fetch_interval_minutes,
        )
        .await
    {
        Ok(feed) => (StatusCode::CREATED, Json(feed)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
