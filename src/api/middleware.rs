//! API Middleware (Rate Limiting, Logging)

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{ApiError, ApiResponse};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    /// Window duration
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window_duration: Duration::from_secs(60),
        }
    }
}

/// Fixed-window limiter keyed by client
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

/// Outcome of a limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.config.window_duration {
            *entry = (0, now);
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.config.requests_per_window {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_secs,
            };
        }

        entry.0 += 1;
        RateDecision {
            allowed: true,
            remaining: self.config.requests_per_window - entry.0,
            reset_secs,
        }
    }

    /// Forget clients idle for two windows
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        let horizon = self.config.window_duration * 2;
        self.requests
            .retain(|_, (_, started)| now.duration_since(*started) < horizon);
        before.saturating_sub(self.requests.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

lazy_static::lazy_static! {
    pub static ref RATE_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::default());
}

/// Periodic cleanup of the global limiter. Abort the handle on shutdown.
pub fn start_cleanup_task() -> JoinHandle<()> {
    let limiter = Arc::clone(&RATE_LIMITER);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                debug!(removed, "Rate limiter cleanup");
            }
        }
    })
}

fn is_health_path(path: &str) -> bool {
    path == "/health" || path == "/v1/health"
}

/// Client key: first X-Forwarded-For hop, then X-Real-IP
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(headers: HeaderMap, request: Request, next: Next) -> Response {
    if is_health_path(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&headers);
    let decision = RATE_LIMITER.check(&key);

    if !decision.allowed {
        warn!(client = %key, "Rate limit exceeded");
        let body = ApiResponse::error(ApiError::rate_limited(decision.reset_secs), 0.0);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert("retry-after", decision.reset_secs.into());
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-remaining", decision.remaining.into());
    headers.insert("x-ratelimit-reset", decision.reset_secs.into());
    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_blocks_after_budget() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(60),
        });

        let first = limiter.check("1.2.3.4");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check("1.2.3.4").allowed);
        assert!(!limiter.check("1.2.3.4").allowed);

        // Other clients have their own window.
        assert!(limiter.check("5.6.7.8").allowed);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 1,
            window_duration: Duration::from_millis(0),
        });
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(client_key(&headers), "10.0.0.2");
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers), "203.0.113.7");
    }
}
