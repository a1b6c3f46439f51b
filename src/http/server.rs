//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, rate limiting, CORS,
//!   security headers)
//! - Guard the internal trust API
//! - Own background tasks (maintenance sweeper, scan completion worker)
//! - Bind server to listener and drain on shutdown
//!
//! # Shutdown
//! The maintenance sweeper stops as soon as shutdown fires. The completion
//! worker is stopped only after in-flight requests have drained, and applies
//! every completion still queued before exiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{handle_layer_error, json_layer_errors};
use crate::http::{otp, proxy, scans, status};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::otp::OtpAuthority;
use crate::routing::ServiceRouter;
use crate::scanning::{
    ContentSafetyPipeline, InMemoryObjectStore, ObjectStore, ScanCompletion, ScanEngine,
    StubScanEngine,
};
use crate::security::cors::cors_layer;
use crate::security::internal_auth::{internal_auth_middleware, InternalKey};
use crate::security::rate_limit::{rate_limit_middleware, FixedWindowLimiter, RateLimitState};
use crate::security::response_headers::with_security_headers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<ServiceRouter>,
    pub client: Client<HttpConnector, Body>,
    pub upstream_timeout: Duration,
    pub otp: OtpAuthority,
    pub scans: Arc<ContentSafetyPipeline>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: Arc<GatewayConfig>,
    limiter: Arc<FixedWindowLimiter>,
    otp: OtpAuthority,
    scans: Arc<ContentSafetyPipeline>,
    completions: mpsc::Receiver<ScanCompletion>,
}

impl GatewayServer {
    /// Create a server with the stub scan engine and an in-memory object store.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_scan_backend(
            config,
            Arc::new(StubScanEngine),
            Arc::new(InMemoryObjectStore::new()),
        )
    }

    pub fn with_scan_backend(
        config: GatewayConfig,
        engine: Arc<dyn ScanEngine>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let config = Arc::new(config);
        let service_router = Arc::new(ServiceRouter::from_config(&config.upstreams));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
        let otp = OtpAuthority::from_config(&config.otp);
        let (pipeline, completions) = ContentSafetyPipeline::new(engine, objects, &config.scanning);
        let scans = Arc::new(pipeline);

        let state = AppState {
            config: config.clone(),
            router: service_router,
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            otp: otp.clone(),
            scans: scans.clone(),
        };

        let router = Self::build_router(&config, state, limiter.clone());
        Self {
            router,
            config,
            limiter,
            otp,
            scans,
            completions,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Router {
        let internal = Router::new()
            .route("/otp/issue", post(otp::issue))
            .route("/otp/verify", post(otp::verify))
            .route("/scans/inline", post(scans::scan_inline))
            .route("/scans/reference", post(scans::scan_reference))
            .route("/scans/{id}", get(scans::get_scan))
            .route("/scans/{id}/delivery", get(scans::delivery))
            .route("/scans/{id}/complete", post(scans::complete))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.scanning.max_inline_bytes))
            .layer(middleware::map_response(json_layer_errors))
            .route_layer(middleware::from_fn_with_state(
                InternalKey::new(&config.internal.api_key),
                internal_auth_middleware,
            ));

        let mut app = Router::new()
            .route("/health", get(status::health))
            .route("/", get(status::info))
            .nest("/internal", internal)
            .fallback(proxy::proxy_handler)
            .with_state(state);

        if config.rate_limit.enabled {
            app = app.layer(middleware::from_fn_with_state(
                RateLimitState {
                    limiter,
                    trust_forwarded_for: config.rate_limit.trust_forwarded_for,
                },
                rate_limit_middleware,
            ));
        }

        let app = app
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_layer_error))
                    .timeout(Duration::from_secs(config.timeouts.request_secs)),
            )
            .layer(cors_layer(&config.cors));

        with_security_headers(app)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener, until
    /// `shutdown` fires. The completion worker is stopped after the drain.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstreams = self.config.upstreams.len(),
            mode = self.config.environment.as_str(),
            "HTTP server starting"
        );

        let worker_stop = Shutdown::new();
        let worker = tokio::spawn(
            self.scans
                .clone()
                .run_completions(self.completions, worker_stop.subscribe()),
        );
        let maintenance = tokio::spawn(run_maintenance(
            self.limiter.clone(),
            self.otp.clone(),
            self.scans.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            shutdown.clone(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await;

        // In-flight webhooks are done; let the worker apply what they queued.
        worker_stop.trigger();
        let (worker, maintenance) = tokio::join!(worker, maintenance);
        log_task_exit("scan completion worker", worker);
        log_task_exit("maintenance", maintenance);

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Handle on the scan pipeline, e.g. to subscribe to scan events.
    pub fn pipeline(&self) -> Arc<ContentSafetyPipeline> {
        self.scans.clone()
    }

    pub fn otp(&self) -> OtpAuthority {
        self.otp.clone()
    }

    pub fn limiter(&self) -> Arc<FixedWindowLimiter> {
        self.limiter.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Log a background task that panicked or was cancelled. Returns whether it
/// finished cleanly.
fn log_task_exit(task: &'static str, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) if e.is_panic() => {
            tracing::error!(task, error = %e, "Background task panicked");
            false
        }
        Err(e) => {
            tracing::error!(task, error = %e, "Background task failed");
            false
        }
    }
}

/// Periodically drop elapsed rate budgets, expired passcodes and settled
/// scan results past their retention.
async fn run_maintenance(
    limiter: Arc<FixedWindowLimiter>,
    otp: OtpAuthority,
    scans: Arc<ContentSafetyPipeline>,
    every: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let budgets = limiter.sweep(now);
                let passcodes = otp.sweep_expired(now);
                let scan_results = scans.sweep_settled(chrono::Utc::now());
                if budgets + passcodes + scan_results > 0 {
                    tracing::debug!(budgets, passcodes, scan_results, "Maintenance sweep");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Maintenance task stopping");
                break;
            }
        }
    }
}
