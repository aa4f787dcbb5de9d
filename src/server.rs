use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::fetch::{OutboundRequest, ResponsesFetch, ShimBody, ShimResponse};
use crate::logging::SharedLogger;
use crate::translate::types::ChatErrorResponse;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: BridgeConfig,
    pub base_url: String,
    pub fetch: ResponsesFetch,
    pub logger: SharedLogger,
}

impl AppState {
    /// Resolve the upstream URL and build the fetch layer from `config`.
    pub fn new(config: BridgeConfig, client: reqwest::Client, logger: SharedLogger) -> crate::Result<Self> {
        let base_url = config.effective_base_url()?;
        let fetch = ResponsesFetch::new(client, &config, logger.clone())?;
        Ok(Self {
            config,
            base_url,
            fetch,
            logger,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(handle_health))
        .route("/debug/logs", get(handle_logs))
        .fallback(handle_passthrough)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let url = upstream_url(&state.base_url, "/chat/completions", &uri);

    state.logger.debug(
        "server",
        format!("Chat completion request body_len={} api={}", body.len(), state.fetch.api()),
    );

    let req = OutboundRequest {
        method: Method::POST,
        url,
        headers,
        body: Some(body),
    };
    forward(&state, req).await
}

/// Everything else under `/v1` (models, embeddings, ...) goes upstream untranslated.
async fn handle_passthrough(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(rest) = uri.path().strip_prefix("/v1") else {
        let err = ChatErrorResponse::new(
            "invalid_request_error",
            format!("Unknown path {}", uri.path()),
        );
        return (StatusCode::NOT_FOUND, Json(err)).into_response();
    };

    let req = OutboundRequest {
        method,
        url: upstream_url(&state.base_url, rest, &uri),
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    };
    forward(&state, req).await
}

async fn forward(state: &AppState, req: OutboundRequest) -> Response {
    match state.fetch.fetch(req).await {
        Ok(shim) => shim_to_response(shim),
        Err(e) => {
            state.logger.error("server", format!("Bridge error: {}", e));
            error_response(&e)
        }
    }
}

fn shim_to_response(shim: ShimResponse) -> Response {
    let body = match shim.body {
        ShimBody::Full(bytes) => Body::from(bytes),
        ShimBody::Stream(stream) => Body::from_stream(stream),
    };
    let mut response = Response::new(body);
    *response.status_mut() = shim.status;
    *response.headers_mut() = shim.headers;
    response
}

fn error_response(err: &BridgeError) -> Response {
    let body = ChatErrorResponse::new(err.kind(), err.to_string());
    (StatusCode::BAD_GATEWAY, Json(body)).into_response()
}

fn upstream_url(base_url: &str, path: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{base_url}{path}?{query}"),
        None => format!("{base_url}{path}"),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "api": state.fetch.api().to_string(),
        "upstream": state.base_url,
    }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

async fn handle_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Json<serde_json::Value> {
    let entries = state.logger.recent(query.limit.unwrap_or(100));
    Json(serde_json::json!({ "data": entries, "debug": state.logger.debug_enabled() }))
}
