//! Axum router construction.

use std::sync::Arc;

use axum::{Router, middleware};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::rate_limit;
use crate::state::AppState;
use crate::ws;

/// CORS policy: a single allowed origin when configured, otherwise any.
pub fn cors_layer(client_url: Option<&str>) -> CorsLayer {
    let origin = match client_url.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            warn!(error = %e, "Invalid client URL, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the complete router: REST API under `/api` plus `GET /ws`.
///
/// Unmatched `/api` paths fall back to a JSON `404`. When the state carries
/// a [`RateLimiter`](crate::rate_limit::RateLimiter) it guards every `/api`
/// request, including the fallback.
pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let mut api = Router::new()
        .route("/leaderboard", get(handlers::leaderboard))
        .route("/activity", get(handlers::recent_activity))
        .route(
            "/entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route("/house/{house}/stats", get(handlers::house_stats))
        .route("/generator/control", post(handlers::generator_control))
        .route("/generator/status", get(handlers::generator_status))
        .route("/health", get(handlers::health))
        .fallback(handlers::api_not_found);

    if let Some(limiter) = &state.rate_limiter {
        api = api.layer(middleware::from_fn_with_state(
            Arc::clone(limiter),
            rate_limit::enforce,
        ));
    }

    Router::new()
        .route("/ws", get(ws::ws_leaderboard))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
