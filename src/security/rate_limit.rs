//! Fixed-window rate limiting.
//!
//! Each client identity gets a budget of `max_requests` per window. The first
//! request after a window has elapsed opens a new one with count 1.
//!
//! A client can land up to `2 × max_requests` in a short burst that straddles
//! a window boundary. That is the accepted cost of fixed windows over a
//! sliding log. Rejections carry no retry-after hint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::response::GatewayError;
use crate::observability::metrics;

/// Request count for one client within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub window_start: Instant,
    pub count: u64,
}

impl RateBudget {
    fn is_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// Count one request, opening a new window if this one is over.
    fn hit(&mut self, now: Instant, window: Duration) {
        if self.is_elapsed(now, window) {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;
    }
}

/// Storage for client budgets.
///
/// Implementations must make `increment` atomic per client id. A shared store
/// (e.g. Redis INCR + EXPIRE) fits the same shape.
pub trait BudgetStore: Send + Sync {
    fn get(&self, client_id: &str) -> Option<RateBudget>;

    fn set(&self, client_id: &str, budget: RateBudget);

    /// Count a request for `client_id` and return the updated budget.
    fn increment(&self, client_id: &str, now: Instant, window: Duration) -> RateBudget;

    /// Remove budgets whose window has elapsed. Returns how many were removed.
    fn sweep(&self, now: Instant, window: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local budget table.
///
/// DashMap shards its locks, so an increment only blocks clients that hash to
/// the same shard.
#[derive(Debug, Default)]
pub struct InMemoryBudgetStore {
    budgets: DashMap<String, RateBudget>,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BudgetStore for InMemoryBudgetStore {
    fn get(&self, client_id: &str) -> Option<RateBudget> {
        self.budgets.get(client_id).map(|b| *b)
    }

    fn set(&self, client_id: &str, budget: RateBudget) {
        self.budgets.insert(client_id.to_string(), budget);
    }

    fn increment(&self, client_id: &str, now: Instant, window: Duration) -> RateBudget {
        // Fast path avoids allocating the key for known clients.
        if let Some(mut budget) = self.budgets.get_mut(client_id) {
            budget.hit(now, window);
            return *budget;
        }
        let mut budget = self
            .budgets
            .entry(client_id.to_string())
            .or_insert(RateBudget {
                window_start: now,
                count: 0,
            });
        budget.hit(now, window);
        *budget
    }

    fn sweep(&self, now: Instant, window: Duration) -> usize {
        let before = self.budgets.len();
        self.budgets.retain(|_, budget| !budget.is_elapsed(now, window));
        before.saturating_sub(self.budgets.len())
    }

    fn len(&self) -> usize {
        self.budgets.len()
    }
}

/// Decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u64 },
    Rejected,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Fixed-window limiter over a [`BudgetStore`].
pub struct FixedWindowLimiter {
    store: Arc<dyn BudgetStore>,
    window: Duration,
    max_requests: u64,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self::with_store(Arc::new(InMemoryBudgetStore::new()), window, max_requests)
    }

    pub fn with_store(store: Arc<dyn BudgetStore>, window: Duration, max_requests: u64) -> Self {
        Self {
            store,
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }

    /// Count a request from `client_id` at `now` and decide whether it passes.
    pub fn admit(&self, client_id: &str, now: Instant) -> Admission {
        let budget = self.store.increment(client_id, now, self.window);
        if budget.count <= self.max_requests {
            Admission::Allowed {
                remaining: self.max_requests - budget.count,
            }
        } else {
            Admission::Rejected
        }
    }

    /// Drop elapsed budgets. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let removed = self.store.sweep(now, self.window);
        metrics::record_budget_count(self.store.len());
        removed
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<FixedWindowLimiter>,
    pub trust_forwarded_for: bool,
}

/// Identity a request is counted against: the peer IP, or the first
/// X-Forwarded-For hop when that header is trusted.
pub fn client_id(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_id(&request, state.trust_forwarded_for);

    match state.limiter.admit(&key, Instant::now()) {
        Admission::Allowed { .. } => next.run(request).await,
        Admission::Rejected => {
            tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limited();
            GatewayError::RateLimited.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::thread;

    fn limiter(max: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(Duration::from_secs(15 * 60), max)
    }

    #[test]
    fn test_budget_then_reject() {
        let limiter = limiter(100);
        let now = Instant::now();

        for i in 0..100 {
            assert_eq!(
                limiter.admit("10.0.0.1", now),
                Admission::Allowed { remaining: 99 - i }
            );
        }
        assert_eq!(limiter.admit("10.0.0.1", now), Admission::Rejected);
        assert_eq!(limiter.admit("10.0.0.1", now), Admission::Rejected);
    }

    #[test]
    fn test_window_rollover_resets_budget() {
        let limiter = limiter(2);
        let start = Instant::now();

        assert!(limiter.admit("a", start).is_allowed());
        assert!(limiter.admit("a", start).is_allowed());
        assert!(!limiter.admit("a", start + Duration::from_secs(60)).is_allowed());

        // Exactly one window after the first request the budget resets.
        let later = start + limiter.window();
        assert_eq!(limiter.admit("a", later), Admission::Allowed { remaining: 1 });
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.admit("a", now).is_allowed());
        assert!(!limiter.admit("a", now).is_allowed());
        assert!(limiter.admit("b", now).is_allowed());
    }

    #[test]
    fn test_boundary_burst_allows_twice_the_budget() {
        let limiter = limiter(3);
        let start = Instant::now();
        let edge = start + limiter.window() - Duration::from_millis(1);

        // Open the window, then burst right before and right after its end.
        assert!(limiter.admit("c", start).is_allowed());
        let mut admitted = 0;
        for _ in 0..2 {
            if limiter.admit("c", edge).is_allowed() {
                admitted += 1;
            }
        }
        for _ in 0..3 {
            if limiter.admit("c", start + limiter.window()).is_allowed() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_sweep_drops_elapsed_budgets() {
        let limiter = limiter(5);
        let start = Instant::now();
        limiter.admit("old", start);
        limiter.admit("new", start + Duration::from_secs(600));

        assert_eq!(limiter.sweep(start + limiter.window()), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_store_get_and_set() {
        let store = InMemoryBudgetStore::new();
        let now = Instant::now();
        assert!(store.get("x").is_none());
        store.set("x", RateBudget { window_start: now, count: 7 });
        assert_eq!(store.get("x").map(|b| b.count), Some(7));
        assert_eq!(store.increment("x", now, Duration::from_secs(1)).count, 8);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_budget() {
        let limiter = Arc::new(limiter(50));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.admit("shared", now).is_allowed())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&request, true), "203.0.113.7");
        assert_eq!(client_id(&request, false), "unknown");
    }

    #[tokio::test]
    async fn test_middleware_returns_429() {
        use axum::{middleware, routing::get, Router};
        use tower::ServiceExt;

        let state = RateLimitState {
            limiter: Arc::new(limiter(1)),
            trust_forwarded_for: false,
        };
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = axum::body::to_bytes(second.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 429);
        assert_eq!(body["error"], "Too many requests, please try again later.");
    }
}
