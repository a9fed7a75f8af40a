//! Per-client fixed-window request limiting for the `/api` routes.
//!
//! Each client IP gets a budget of requests per window. The budget resets
//! when the window that started with the client's first request expires.
//! Requests without connection info share a single bucket.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use housecup_core::config::RateLimitConfig;
use tracing::debug;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    started: Instant,
    count: u32,
}

/// Fixed-window counter keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<BTreeMap<IpAddr, Bucket>>,
}

impl RateLimiter {
    /// Allow `max_requests` per client in every `window`.
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(BTreeMap::new()),
        }
    }

    /// Build a limiter from config, or `None` when limiting is disabled.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.max_requests, config.window()))
    }

    /// Count one request from `client` at `now`.
    ///
    /// Returns `false` once the client has used its budget for the
    /// current window.
    pub fn check(&self, client: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.started) < self.window);

        let bucket = clients.entry(client).or_insert(Bucket {
            started: now,
            count: 0,
        });
        if bucket.count >= self.max_requests {
            return false;
        }
        bucket.count = bucket.count.saturating_add(1);
        true
    }
}

/// Middleware rejecting over-budget clients with `429 Too Many Requests`.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip());

    if limiter.check(client, Instant::now()) {
        next.run(request).await
    } else {
        debug!(%client, "Rate limit exceeded");
        ApiError::TooManyRequests(String::from(
            "Too many requests from this IP, please try again later.",
        ))
        .into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    const ALICE: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const BOB: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn budget_is_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check(ALICE, now));
        assert!(limiter.check(ALICE, now));
        assert!(!limiter.check(ALICE, now));
        assert!(limiter.check(BOB, now));
    }

    #[test]
    fn budget_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check(ALICE, now));
        assert!(!limiter.check(ALICE, now + Duration::from_secs(59)));
        assert!(limiter.check(ALICE, now + Duration::from_secs(60)));
    }

    #[test]
    fn disabled_config_builds_no_limiter() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(RateLimiter::from_config(&config).is_none());
        assert!(RateLimiter::from_config(&RateLimitConfig::default()).is_some());
    }
}
