//! Integration tests for the REST endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` against
//! the in-memory ledger store, without starting a TCP server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use housecup_core::HouseCupConfig;
use housecup_db::{LedgerBackend, MemoryLedgerStore};
use housecup_server::{AppState, build_router, cors_layer};
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_state() -> Arc<AppState> {
    make_state_with(&HouseCupConfig::default())
}

fn make_state_with(config: &HouseCupConfig) -> Arc<AppState> {
    Arc::new(AppState::new(
        LedgerBackend::Memory(MemoryLedgerStore::new()),
        config,
    ))
}

fn app(state: &Arc<AppState>) -> Router {
    build_router(Arc::clone(state), cors_layer(None))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn post(state: &Arc<AppState>, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn add(state: &Arc<AppState>, house: &str, points: i64) {
    let (status, _) = post(
        state,
        "/api/entries",
        &json!({ "house": house, "points": points, "reason": "test" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn empty_leaderboard_lists_every_house() {
    let state = make_state();
    let (status, body) = get(&state, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());

    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["house"], "Gryffindor");
    assert_eq!(rows[0]["color"], "#740001");
    assert_eq!(rows[0]["rank"], 1);
    assert!(rows.iter().all(|r| r["total_points"] == 0));
}

#[tokio::test]
async fn leaderboard_ranks_recorded_entries() {
    let state = make_state();
    add(&state, "Gryffindor", 50).await;
    add(&state, "Slytherin", 30).await;
    add(&state, "Ravenclaw", 40).await;
    add(&state, "Hufflepuff", 35).await;
    add(&state, "Gryffindor", -20).await;
    add(&state, "Slytherin", 25).await;

    let (_, body) = get(&state, "/api/leaderboard?timeWindow=5min").await;
    let houses: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["house"].as_str().unwrap())
        .collect();
    assert_eq!(houses, ["Slytherin", "Ravenclaw", "Hufflepuff", "Gryffindor"]);
    assert_eq!(body["data"][0]["total_points"], 55);
}

#[tokio::test]
async fn unknown_window_falls_back_to_all_time() {
    let state = make_state();
    add(&state, "Hufflepuff", 12).await;
    let (status, body) = get(&state, "/api/leaderboard?timeWindow=fortnight").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["house"], "Hufflepuff");
}

#[tokio::test]
async fn out_of_range_points_rejected() {
    let state = make_state();
    let (status, body) = post(
        &state,
        "/api/entries",
        &json!({ "house": "Gryffindor", "points": 101, "reason": "too much" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("points"));

    let (_, body) = get(&state, "/api/activity").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_house_rejected() {
    let state = make_state();
    let (status, _) = post(
        &state,
        "/api/entries",
        &json!({ "house": "Durmstrang", "points": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&state, "/api/house/Durmstrang/stats").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn activity_is_newest_first_and_limited() {
    let state = make_state();
    for points in 1..=4 {
        add(&state, "Ravenclaw", points).await;
    }
    let (status, body) = get(&state, "/api/activity?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["points"], 4);
    assert_eq!(entries[1]["points"], 3);
}

#[tokio::test]
async fn invalid_activity_limit_rejected() {
    let state = make_state();
    let (status, _) = get(&state, "/api/activity?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&state, "/api/activity?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entries_window_validates_minutes() {
    let state = make_state();
    add(&state, "Slytherin", 9).await;
    let (status, body) = get(&state, "/api/entries?minutes=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = get(&state, "/api/entries?minutes=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entries_window_requires_minutes() {
    let state = make_state();
    add(&state, "Slytherin", 9).await;
    let (status, body) = get(&state, "/api/entries").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("minutes"));
}

#[tokio::test]
async fn overlong_reason_rejected() {
    let state = make_state();
    let (status, body) = post(
        &state,
        "/api/entries",
        &json!({ "house": "Ravenclaw", "points": 5, "reason": "r".repeat(300) }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("reason"));

    let (_, body) = get(&state, "/api/activity").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn house_stats_found_and_not_found() {
    let state = make_state();
    add(&state, "Gryffindor", 30).await;
    add(&state, "Gryffindor", -10).await;

    let (status, body) = get(&state, "/api/house/Gryffindor/stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["entry_count"], 2);
    assert_eq!(stats["total_points"], 20);
    assert_eq!(stats["avg_points"], "10");
    assert_eq!(stats["max_points"], 30);
    assert_eq!(stats["min_points"], -10);
    assert_eq!(stats["positive_points"], 30);
    assert_eq!(stats["negative_points"], -10);

    let (status, body) = get(&state, "/api/house/Hufflepuff/stats").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn generator_control_round_trip() {
    let state = make_state();

    let (status, body) = post(&state, "/api/generator/control", &json!({ "action": "generate" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["entries"].as_array().unwrap().len(), 1);

    let (status, body) = post(
        &state,
        "/api/generator/control",
        &json!({ "action": "start", "intervalMinutes": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["status"]["running"], true);

    let (_, body) = post(&state, "/api/generator/control", &json!({ "action": "start" })).await;
    assert_eq!(body["data"]["changed"], false);

    let (_, body) = get(&state, "/api/generator/status").await;
    assert_eq!(body["data"]["running"], true);

    let (_, body) = post(&state, "/api/generator/control", &json!({ "action": "stop" })).await;
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["status"]["running"], false);
}

#[tokio::test]
async fn generator_test_scenario_populates_windows() {
    let state = make_state();
    let (status, body) = post(&state, "/api/generator/control", &json!({ "action": "test" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["entries"].as_array().unwrap().len(), 6);

    let (_, body) = get(&state, "/api/entries?minutes=5").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body) = get(&state, "/api/entries?minutes=60").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
    let (_, body) = get(&state, "/api/entries?minutes=1440").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn generator_rejects_bad_requests() {
    let state = make_state();
    let (status, _) = post(&state, "/api/generator/control", &json!({ "action": "explode" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &state,
        "/api/generator/control",
        &json!({ "action": "bulk", "count": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &state,
        "/api/generator/control",
        &json!({ "action": "start", "intervalMinutes": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_backend() {
    let state = make_state();
    let (status, body) = get(&state, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["store"], "memory");
}

#[tokio::test]
async fn posted_entry_reaches_live_subscribers() {
    let state = make_state();
    let fanout = state.start_fanout();
    let mut sub = state.hub.subscribe().await;
    sub.receiver.recv().await.unwrap();

    add(&state, "Slytherin", 20).await;

    let message = serde_json::to_value(sub.receiver.recv().await.unwrap()).unwrap();
    assert_eq!(message["event"], "new-entry");
    assert_eq!(message["data"]["entry"]["house"], "Slytherin");
    assert_eq!(message["data"]["leaderboard"]["type"], "new-entry");
    assert_eq!(message["data"]["leaderboard"]["data"][0]["house"], "Slytherin");
    fanout.abort();
}

#[tokio::test]
async fn unknown_api_path_answers_json_not_found() {
    let state = make_state();
    let (status, body) = get(&state, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "API endpoint not found");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn api_requests_over_budget_are_throttled() {
    let mut config = HouseCupConfig::default();
    config.http.rate_limit.max_requests = 2;
    let state = make_state_with(&config);

    for _ in 0..2 {
        let (status, _) = get(&state, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&state, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Too many requests"));
}

#[tokio::test]
async fn disabled_rate_limit_never_throttles() {
    let mut config = HouseCupConfig::default();
    config.http.rate_limit.enabled = false;
    config.http.rate_limit.max_requests = 1;
    let state = make_state_with(&config);

    for _ in 0..3 {
        let (status, _) = get(&state, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
