// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the credibility gate.
//!
//! `POST /v1/analyze` runs the gate (credential, tier, rate limit) and
//! hands admitted requests to the configured [`AnalysisEngine`].

use crate::analysis::{AnalysisEngine, AnalysisRequest, AnalysisResult, StaticAnalysisEngine};
use crate::auth::ApiKeyAuthenticator;
use crate::config::Config;
use crate::error::{GateError, StateError};
use crate::limiter::{RateLimitResult, RateLimiter, Tier};
use crate::metrics::GateMetrics;
use crate::store::{InMemoryStore, RateLimitStore};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub authenticator: ApiKeyAuthenticator,
    pub limiter: RateLimiter,
    pub engine: Arc<dyn AnalysisEngine>,
    pub metrics: GateMetrics,
}

impl AppState {
    /// Assemble state from explicit parts.
    ///
    /// The config is validated first, so [`router`] never sees a metrics
    /// path that collides with a built-in route.
    pub fn new(
        config: Config,
        store: Arc<dyn RateLimitStore>,
        engine: Arc<dyn AnalysisEngine>,
    ) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self {
            authenticator: ApiKeyAuthenticator::new(&config.auth)?,
            limiter: RateLimiter::new(config.rate_limit.clone(), store),
            engine,
            metrics: GateMetrics::new()?,
            config,
        })
    }

    /// In-memory counters and the static engine.
    pub fn with_defaults(config: Config) -> Result<Self, StateError> {
        Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticAnalysisEngine::new()),
        )
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Liveness message.
pub async fn root() -> &'static str {
    "Credibility analysis API is running"
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "credibility-gate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Gate and answer an analysis request.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client = client_key(&headers, addr, state.config.rate_limit.trust_forwarded_for);

    match admit(&state, &client, &headers, &body).await {
        Ok(Admitted {
            tier,
            limit,
            remaining,
            result,
        }) => {
            state.metrics.record_admitted(tier);
            debug!(%client, %tier, remaining, engine = state.engine.name(), "Request admitted");
            (
                StatusCode::OK,
                [
                    (
                        HeaderName::from_static("x-ratelimit-limit"),
                        limit.to_string(),
                    ),
                    (
                        HeaderName::from_static("x-ratelimit-remaining"),
                        remaining.to_string(),
                    ),
                ],
                Json(result),
            )
                .into_response()
        }
        Err(err) => {
            state.metrics.record_rejected(err.outcome());
            match &err {
                GateError::RateLimited { limit, retry_after } => info!(
                    %client,
                    limit,
                    retry_after_secs = retry_after.as_secs(),
                    "Request rate limited"
                ),
                GateError::Store(e) => warn!(%client, error = %e, "Rate limit store failed"),
                other => info!(%client, reason = %other, "Request rejected"),
            }
            err.into_response()
        }
    }
}

struct Admitted {
    tier: Tier,
    limit: u32,
    remaining: u32,
    result: AnalysisResult,
}

/// Authenticate, select the tier, apply the limit, then produce the result.
async fn admit(
    state: &AppState,
    client: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Admitted, GateError> {
    state.authenticator.authenticate(headers)?;

    let request = if is_json(headers) {
        AnalysisRequest::from_body(body).map_err(GateError::InvalidBody)?
    } else {
        AnalysisRequest::default()
    };
    let tier = Tier::from_mode(request.mode.as_deref());

    let (limit, remaining) = match state.limiter.check(tier, client).await? {
        RateLimitResult::Allowed {
            limit, remaining, ..
        } => (limit, remaining),
        RateLimitResult::Limited { limit, retry_after } => {
            return Err(GateError::RateLimited { limit, retry_after })
        }
    };
    let result = state.engine.analyze(&request).await;

    Ok(Admitted {
        tier,
        limit,
        remaining,
        result,
    })
}

/// Whether the body is declared as `application/json`. Other bodies are
/// not read, so the request falls back to the standard tier.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Rate-limit identity for a request.
///
/// Uses the first `X-Forwarded-For` hop only when `trust_forwarded_for` is
/// set; otherwise the peer address.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

fn cors_layer(config: &Config, api_key_header: &HeaderName) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, api_key_header.clone()])
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::<Arc<AppState>>::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1/analyze", post(analyze));

    if state.config.metrics.enabled {
        let path = state.config.metrics.path.clone();
        router = router.route(&path, get(metrics));
    }

    let cors = cors_layer(&state.config, state.authenticator.header_name());

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
