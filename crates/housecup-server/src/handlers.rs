//! REST endpoint handlers.
//!
//! Every success is wrapped in the envelope
//! `{ "success": true, "data": ..., "timestamp": ... }`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/leaderboard?timeWindow=` | Ranked totals for a window |
//! | `GET` | `/api/activity?limit=` | Newest entries |
//! | `GET` | `/api/entries?minutes=` | Entries in a trailing window |
//! | `POST` | `/api/entries` | Record an entry |
//! | `GET` | `/api/house/{house}/stats` | All-time house statistics |
//! | `POST` | `/api/generator/control` | Start, stop, or run the generator |
//! | `GET` | `/api/generator/status` | Generator state |
//! | `GET` | `/api/health` | Store reachability |
//!
//! Any other path under `/api` answers `404` in the error envelope.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use housecup_types::{House, NewEntry, Window};
use serde::{Deserialize, Serialize};

use crate::control::{self, ControlRequest};
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true`.
    pub success: bool,
    /// The payload.
    pub data: T,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        timestamp: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/leaderboard`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    /// Window token; unknown or missing means all time.
    pub time_window: Option<String>,
}

/// Query parameters for `GET /api/activity`.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Number of entries to return.
    pub limit: Option<u32>,
}

/// Query parameters for `GET /api/entries`.
#[derive(Debug, Default, Deserialize)]
pub struct EntriesQuery {
    /// Trailing window in minutes. Required.
    pub minutes: Option<i64>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Ranked leaderboard for the requested window.
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let window = Window::from_token(query.time_window.as_deref());
    let rows = state.scoreboard.leaderboard(window).await?;
    Ok(ok(rows))
}

/// Most recent entries, newest first.
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let entries = state.scoreboard.recent_activity(query.limit).await?;
    Ok(ok(entries))
}

/// Entries from the last `minutes` minutes.
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    query: Result<Query<EntriesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let minutes = query
        .minutes
        .ok_or_else(|| ApiError::InvalidArgument(String::from("minutes parameter is required")))?;
    let entries = state.scoreboard.entries_in_window(minutes).await?;
    Ok(ok(entries))
}

/// Record a new entry and notify live subscribers.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewEntry>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(entry) = body?;
    let stored = state.record_entry(&entry).await?;
    Ok((StatusCode::CREATED, ok(stored)))
}

/// All-time statistics for one house.
pub async fn house_stats(
    State(state): State<Arc<AppState>>,
    Path(house): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let house: House = house.parse()?;
    let stats = state.scoreboard.house_stats(house).await?;
    Ok(ok(stats))
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Apply a generator control action.
pub async fn generator_control(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let outcome = control::apply(&state, &request).await?;
    Ok(ok(outcome))
}

/// Current generator state.
pub async fn generator_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.generator.status().await)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    store: &'static str,
    subscribers: usize,
}

/// Store reachability and live subscriber count.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.scoreboard.health().await?;
    Ok(ok(Health {
        status: "healthy",
        store: state.store_kind(),
        subscribers: state.hub.subscriber_count().await,
    }))
}

/// Fallback for unmatched `/api` paths.
pub async fn api_not_found() -> ApiError {
    ApiError::NotFound(String::from("API endpoint not found"))
}
