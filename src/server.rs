//! HTTP server for the ScamGuard scoring service.
//!
//! A thin transport around [`Scorer::analyze`]: JSON in, JSON out, with an
//! optional API-key gate, per-IP rate limiting and usage counters.

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::{bail, Result, WrapErr};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{ApiKey, API_KEY_HEADER};
use crate::risk::RiskLevel;
use crate::scorer::{AnalysisResult, Scorer};
use crate::{hash_ruleset, ServerSettings};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Required `x-api-key` value, if any
    pub api_key: Option<ApiKey>,
    /// Rate limit in requests per minute per IP (0 = no limit)
    pub rate_limit_rpm: u32,
    /// Allow any origin, method and header
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            api_key: None,
            rate_limit_rpm: 60,
            cors_allow_any: true,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: Option<&ServerSettings>) -> Result<Self> {
        let mut config = Self::default();
        let Some(settings) = settings else {
            return Ok(config);
        };
        if let Some(ref addr) = settings.bind_addr {
            config.bind_addr = addr
                .parse()
                .wrap_err_with(|| format!("invalid bind_addr '{}'", addr))?;
        }
        if let Some(ref key) = settings.api_key {
            if key.trim().is_empty() {
                bail!("api_key must not be empty, remove it to disable the key check");
            }
            config.api_key = Some(ApiKey::new(key));
        }
        if let Some(rpm) = settings.rate_limit_rpm {
            config.rate_limit_rpm = rpm;
        }
        if let Some(cors) = settings.cors_allow_any {
            config.cors_allow_any = cors;
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Body of `POST /analyze`
#[derive(Debug, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    pub input_message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ruleset_hash: String,
    pub uptime_seconds: u64,
}

/// Stats response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub ruleset_hash: String,
    pub requests: RequestStats,
    pub risk_levels: RiskLevelStats,
    pub scams_detected: u64,
    pub endpoints: EndpointStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestStats {
    pub total: u64,
    pub errors: u64,
    pub unauthorized: u64,
    pub rate_limited: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RiskLevelStats {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointStats {
    pub analyze: u64,
    pub analyze_message: u64,
    pub stats: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Boundary failures. None of these reach the scorer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded. Maximum {0} requests per minute.")]
    RateLimited(u32),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Usage metrics
// ---------------------------------------------------------------------------

/// Atomic usage counters for the server.
#[derive(Default)]
pub struct UsageMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub unauthorized: AtomicU64,
    pub rate_limited: AtomicU64,

    pub low: AtomicU64,
    pub medium: AtomicU64,
    pub high: AtomicU64,
    pub critical: AtomicU64,
    pub scams_detected: AtomicU64,

    pub ep_analyze: AtomicU64,
    pub ep_analyze_message: AtomicU64,
    pub ep_stats: AtomicU64,
}

impl UsageMetrics {
    fn record(&self, result: &AnalysisResult) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let tier = match result.risk_level {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
            RiskLevel::Critical => &self.critical,
        };
        tier.fetch_add(1, Ordering::Relaxed);
        if result.scam_detected {
            self.scams_detected.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_error(&self, error: &ApiError) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        match error {
            ApiError::Unauthorized => {
                self.unauthorized.fetch_add(1, Ordering::Relaxed);
            }
            ApiError::RateLimited(_) => {
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            ApiError::Validation(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

/// Type alias for per-IP rate limiters
type IpRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const MAX_TRACKED_IPS: usize = 10_000;

/// Server state
pub struct ServerState {
    pub config: ServerConfig,
    pub scorer: Scorer,
    pub ruleset_hash: String,
    pub start_time: Instant,
    /// Per-IP rate limiters (lazy-initialized)
    pub rate_limiters: Mutex<HashMap<IpAddr, Arc<IpRateLimiter>>>,
    pub usage: UsageMetrics,
}

impl ServerState {
    pub fn new(config: ServerConfig, scorer: Scorer) -> Self {
        let ruleset_hash = hash_ruleset(scorer.rules());
        Self {
            config,
            scorer,
            ruleset_hash,
            start_time: Instant::now(),
            rate_limiters: Mutex::new(HashMap::new()),
            usage: UsageMetrics::default(),
        }
    }

    /// Get or create a rate limiter for the given IP address.
    pub async fn get_rate_limiter(&self, ip: IpAddr) -> Option<Arc<IpRateLimiter>> {
        let rpm = NonZeroU32::new(self.config.rate_limit_rpm)?;

        let mut limiters = self.rate_limiters.lock().await;

        if let Some(limiter) = limiters.get(&ip) {
            return Some(Arc::clone(limiter));
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));
        limiters.insert(ip, Arc::clone(&limiter));

        if limiters.len() > MAX_TRACKED_IPS {
            tracing::warn!(
                limit = MAX_TRACKED_IPS,
                "rate limiter map exceeded its size limit, clearing"
            );
            limiters.clear();
            limiters.insert(ip, Arc::clone(&limiter));
        }

        Some(limiter)
    }

    async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), ApiError> {
        if let Some(limiter) = self.get_rate_limiter(ip).await {
            if limiter.check().is_err() {
                return Err(ApiError::RateLimited(self.config.rate_limit_rpm));
            }
        }
        Ok(())
    }

    fn check_api_key(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.config.api_key else {
            return Ok(());
        };
        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if expected.verify(presented) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = state.config.cors_allow_any;

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .route("/analyze-message", post(analyze_message_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .wrap_err("server error")?;
    Ok(())
}

/// Bind and run the HTTP server until Ctrl-C or SIGTERM.
pub async fn run_server(config: ServerConfig, scorer: Scorer) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", config.bind_addr))?;

    let state = Arc::new(ServerState::new(config.clone(), scorer));

    tracing::info!(addr = %config.bind_addr, "ScamGuard server listening");
    tracing::info!("  GET  /                 - Liveness");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  POST /analyze          - Score a message");
    tracing::info!("  POST /analyze-message  - Score a message (alias)");
    tracing::info!("  GET  /stats            - Usage statistics");
    tracing::info!(
        api_key = config.api_key.is_some(),
        rate_limit_rpm = config.rate_limit_rpm,
        cors_allow_any = config.cors_allow_any,
        ruleset_hash = %state.ruleset_hash,
        "server settings"
    );

    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    tracing::info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "API running" }))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ruleset_hash: state.ruleset_hash.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn analyze_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    state.usage.ep_analyze.fetch_add(1, Ordering::Relaxed);
    analyze_and_respond(&state, addr.ip(), &headers, body, "analyze").await
}

/// Alias kept for front ends that post to `/analyze-message`.
async fn analyze_message_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    state.usage.ep_analyze_message.fetch_add(1, Ordering::Relaxed);
    analyze_and_respond(&state, addr.ip(), &headers, body, "analyze_message").await
}

/// Shared gatekeeping + scoring for both analyze routes.
async fn analyze_and_respond(
    state: &ServerState,
    client_ip: IpAddr,
    headers: &HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
    endpoint: &str,
) -> Result<Json<AnalysisResult>, ApiError> {
    let start = Instant::now();

    let gate = async {
        state.check_rate_limit(client_ip).await?;
        state.check_api_key(headers)?;
        body.map_err(|rejection| ApiError::Validation(rejection.body_text()))
    };

    let Json(request) = match gate.await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(endpoint, %client_ip, error = %e, "request rejected");
            state.usage.record_error(&e);
            return Err(e);
        }
    };

    let result = state.scorer.analyze(&request.input_message);
    state.usage.record(&result);

    tracing::info!(
        endpoint,
        risk_level = %result.risk_level,
        confidence = result.confidence,
        scam_detected = result.scam_detected,
        message_chars = request.input_message.chars().count(),
        processing_time_us = start.elapsed().as_micros() as u64,
        "analyzed message"
    );

    Ok(Json(result))
}

/// Stats endpoint
async fn stats_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.usage.ep_stats.fetch_add(1, Ordering::Relaxed);
    let usage = &state.usage;

    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        ruleset_hash: state.ruleset_hash.clone(),
        requests: RequestStats {
            total: usage.total_requests.load(Ordering::Relaxed),
            errors: usage.total_errors.load(Ordering::Relaxed),
            unauthorized: usage.unauthorized.load(Ordering::Relaxed),
            rate_limited: usage.rate_limited.load(Ordering::Relaxed),
        },
        risk_levels: RiskLevelStats {
            low: usage.low.load(Ordering::Relaxed),
            medium: usage.medium.load(Ordering::Relaxed),
            high: usage.high.load(Ordering::Relaxed),
            critical: usage.critical.load(Ordering::Relaxed),
        },
        scams_detected: usage.scams_detected.load(Ordering::Relaxed),
        endpoints: EndpointStats {
            analyze: usage.ep_analyze.load(Ordering::Relaxed),
            analyze_message: usage.ep_analyze_message.load(Ordering::Relaxed),
            stats: usage.ep_stats.load(Ordering::Relaxed),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = ServerSettings {
            bind_addr: Some("0.0.0.0:9000".to_string()),
            api_key: Some("k".to_string()),
            rate_limit_rpm: Some(0),
            cors_allow_any: Some(false),
        };
        let config = ServerConfig::from_settings(Some(&settings)).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.api_key.as_ref().unwrap().verify(Some("k")));
        assert_eq!(config.rate_limit_rpm, 0);
        assert!(!config.cors_allow_any);
    }

    #[test]
    fn test_config_bad_bind_addr() {
        let settings = ServerSettings {
            bind_addr: Some("localhost".to_string()),
            ..Default::default()
        };
        assert!(ServerConfig::from_settings(Some(&settings)).is_err());
    }

    #[test]
    fn test_config_empty_api_key_rejected() {
        for key in ["", "  "] {
            let settings = ServerSettings {
                api_key: Some(key.to_string()),
                ..Default::default()
            };
            assert!(ServerConfig::from_settings(Some(&settings)).is_err());
        }
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::RateLimited(5).status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_api_key_gate() {
        let config = ServerConfig {
            api_key: Some(ApiKey::new("secret")),
            ..Default::default()
        };
        let state = ServerState::new(config, Scorer::default());

        let mut headers = HeaderMap::new();
        assert!(matches!(state.check_api_key(&headers), Err(ApiError::Unauthorized)));
        headers.insert(API_KEY_HEADER, "wrong".parse().unwrap());
        assert!(state.check_api_key(&headers).is_err());
        headers.insert(API_KEY_HEADER, "secret".parse().unwrap());
        assert!(state.check_api_key(&headers).is_ok());
    }

    #[test]
    fn test_no_api_key_means_open() {
        let state = ServerState::new(ServerConfig::default(), Scorer::default());
        assert!(state.check_api_key(&HeaderMap::new()).is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_disabled_at_zero() {
        let config = ServerConfig {
            rate_limit_rpm: 0,
            ..Default::default()
        };
        let state = ServerState::new(config, Scorer::default());
        assert!(state.get_rate_limiter("127.0.0.1".parse().unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_reused_per_ip() {
        let state = ServerState::new(ServerConfig::default(), Scorer::default());
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let a = state.get_rate_limiter(ip).await.unwrap();
        let b = state.get_rate_limiter(ip).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_usage_metrics_counters() {
        let metrics = UsageMetrics::default();
        metrics.record(&crate::analyze("SBI KYC blocked, OTP 123456"));
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.critical.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.scams_detected.load(Ordering::Relaxed), 1);

        metrics.record_error(&ApiError::Unauthorized);
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.total_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.unauthorized.load(Ordering::Relaxed), 1);
    }
}
