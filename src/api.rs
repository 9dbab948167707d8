//! HTTP surface: the three analysis endpoints and a liveness probe.

use crate::analysis::AnalysisService;
use crate::config::Config;
use crate::llm::{FallbackChain, ProviderError};
use crate::models::{AnalysisRequest, DEFAULT_LANGUAGE};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub struct ServerState {
    pub service: AnalysisService,
    /// Requests seen by the analysis endpoints since start.
    pub requests: AtomicU64,
    pub limiter: Option<DefaultDirectRateLimiter>,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(service: AnalysisService, rate_limit_per_minute: Option<u32>) -> Self {
        let limiter = rate_limit_per_minute
            .and_then(NonZeroU32::new)
            .map(|per_minute| RateLimiter::direct(Quota::per_minute(per_minute)));
        Self {
            service,
            requests: AtomicU64::new(0),
            limiter,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No code provided")]
    NoCode,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Too many requests")]
    RateLimited,
    #[error("{context}: {source}")]
    Provider {
        context: &'static str,
        source: ProviderError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NoCode => (
                StatusCode::BAD_REQUEST,
                json!({"error": "No code provided"}),
            ),
            ApiError::InvalidBody(details) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid request body", "details": details}),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({"error": "Too many requests"}),
            ),
            ApiError::Provider { context, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": context, "details": source.to_string()}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Pull `code` and `language` out of the body, rejecting blank code.
fn read_request(
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<(String, String), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))?;
    let code = request
        .code
        .filter(|code| !code.trim().is_empty())
        .ok_or(ApiError::NoCode)?;
    let language = request
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    Ok((code, language))
}

pub async fn calculate(
    State(state): State<SharedState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (code, language) = read_request(payload)?;
    let report = state
        .service
        .analyze(&code, &language)
        .await
        .map_err(|source| ApiError::Provider {
            context: "Failed to analyze code",
            source,
        })?;
    Ok(Json(report))
}

pub async fn big_o_analysis(
    State(state): State<SharedState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (code, language) = read_request(payload)?;
    let report = state
        .service
        .big_o(&code, &language)
        .await
        .map_err(|source| ApiError::Provider {
            context: "Failed to analyze BigO complexity",
            source,
        })?;
    Ok(Json(report))
}

pub async fn optimize(
    State(state): State<SharedState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (code, language) = read_request(payload)?;
    let report = state
        .service
        .optimize(&code, &language)
        .await
        .map_err(|source| ApiError::Provider {
            context: "Failed to get optimization suggestions",
            source,
        })?;
    Ok(Json(report))
}

pub async fn liveness() -> impl IntoResponse {
    Json(json!({
        "message": "complexity-ai API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Count every analysis request and enforce the optional rate limit.
async fn admit(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let seen = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("rate limit exceeded on {} (request #{})", req.uri().path(), seen);
            return Err(ApiError::RateLimited);
        }
    }
    debug!("request #{} {}", seen, req.uri().path());
    Ok(next.run(req).await)
}

pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/calculate", post(calculate))
        .route("/api/bigO-analysis", post(big_o_analysis))
        .route("/api/optimize", post(optimize))
        .route_layer(middleware::from_fn_with_state(state.clone(), admit))
        .route("/api/test", get(liveness))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<()> {
    let chain = FallbackChain::from_config(&config)?;
    info!(
        "using {} models in order: {}",
        config.provider,
        chain.model_names().join(", ")
    );
    let service = AnalysisService::new(Arc::new(chain), config.absorb_provider_errors);
    let state = Arc::new(ServerState::new(service, config.rate_limit_per_minute));
    let router = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);
    info!("  POST /api/calculate");
    info!("  POST /api/bigO-analysis");
    info!("  POST /api/optimize");
    info!("  GET  /api/test");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::ScriptedModel;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn app_with(model: ScriptedModel, absorb: bool, rate_limit: Option<u32>) -> Router {
        let service = AnalysisService::new(Arc::new(model), absorb);
        create_router(Arc::new(ServerState::new(service, rate_limit)))
    }

    fn app(reply: &str) -> Router {
        app_with(ScriptedModel::replying("test-model", reply), true, None)
    }

    fn post_json(uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn missing_code_is_400_on_every_endpoint() {
        for uri in ["/api/calculate", "/api/bigO-analysis", "/api/optimize"] {
            for body in [
                json!({"language": "python"}),
                json!({"code": "", "language": "python"}),
                json!({"code": "   \n"}),
            ] {
                let (status, value) = send(app("{}"), post_json(uri, body)).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
                assert_eq!(value, json!({"error": "No code provided"}));
            }
        }
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/api/calculate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, value) = send(app("{}"), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Invalid request body");

        let (status, _) = send(app("{}"), post_json("/api/calculate", json!({"code": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn calculate_returns_normalized_report() {
        let app = app("```json\n{\"complexityScore\": 42}\n```");
        let (status, value) = send(
            app,
            post_json("/api/calculate", json!({"code": "a\nb\nc", "language": "python"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["complexity"], 42);
        assert_eq!(value["analysis"], "No analysis available");
        assert_eq!(value["suggestions"], json!(["No suggestions provided"]));
        assert_eq!(value["bigO"], "O(1)");
        assert_eq!(value["metrics"]["linesOfCode"], 3);
    }

    #[tokio::test]
    async fn provider_outage_still_returns_200() {
        let app = app_with(ScriptedModel::failing("test-model"), true, None);
        let (status, value) = send(app, post_json("/api/calculate", json!({"code": "x\ny"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["complexity"], 0);
        assert!(value["analysis"]
            .as_str()
            .unwrap()
            .contains("test-model overloaded"));
        assert_eq!(value["metrics"]["linesOfCode"], 2);
    }

    #[tokio::test]
    async fn surfaced_provider_outage_is_500() {
        let app = app_with(ScriptedModel::failing("test-model"), false, None);
        let (status, value) = send(app, post_json("/api/optimize", json!({"code": "x"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], "Failed to get optimization suggestions");
        assert!(value["details"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn big_o_and_optimize_have_full_shape() {
        let (status, value) = send(
            app("{}"),
            post_json("/api/bigO-analysis", json!({"code": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["scenarios"]["worstCase"], "O(1)");
        assert_eq!(value["detailedBreakdown"], json!([]));

        let (status, value) = send(app("{}"), post_json("/api/optimize", json!({"code": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
        for key in [
            "improvements",
            "performanceOptimizations",
            "memoryOptimizations",
            "algorithmSuggestions",
            "bestPractices",
        ] {
            assert!(value[key].is_array(), "{key}");
        }
    }

    #[tokio::test]
    async fn liveness_probe_reports_timestamp() {
        let req = HttpRequest::builder()
            .uri("/api/test")
            .body(Body::empty())
            .unwrap();
        let (status, value) = send(app("{}"), req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(value["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_requests() {
        let app = app_with(ScriptedModel::replying("m", "{}"), true, Some(1));
        let (first, _) = send(app.clone(), post_json("/api/calculate", json!({"code": "x"}))).await;
        assert_eq!(first, StatusCode::OK);
        let (second, value) = send(app, post_json("/api/calculate", json!({"code": "x"}))).await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(value["error"], "Too many requests");
    }
}
