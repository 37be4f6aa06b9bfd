use crate::auth;
use crate::config::{ProxyConfig, Upstream};
use crate::error::ProxyError;
use crate::logging::SharedLogger;
use crate::models::list_models;
use crate::relay::{self, RelayOutcome};
use crate::translate::{self, ChatRequest};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub upstream: Upstream,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    let now = chrono::Utc::now().timestamp();
    Json(list_models(&state.config, now)).into_response()
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let log = state.logger.for_request(Uuid::new_v4());

    // Only an unparseable body fails here; field values are never checked locally.
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log.error("server", format!("Failed to parse request: {}", e));
            return ProxyError::from(e).into_response();
        }
    };

    log.debug(
        "server",
        format!("Received chat request: {}", String::from_utf8_lossy(&body)),
    );
    log.info(
        "server",
        format!(
            "Request: model={} streaming={} messages={}",
            req.model.as_ref().map_or_else(|| "-".to_string(), Value::to_string),
            req.is_streaming(),
            req.message_count()
        ),
    );

    let upstream_req = translate::to_upstream(req, &state.upstream.chat_model);

    match relay::relay_chat(
        &upstream_req,
        &state.upstream,
        &state.client,
        state.config.channel_capacity(),
        &log,
    )
    .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => {
            log.error("server", format!("Error processing request: {}", e));
            e.into_response()
        }
    }
}

fn outcome_response(outcome: RelayOutcome) -> Response {
    match outcome {
        RelayOutcome::Buffered { status, body } => {
            (status_code(status), Json(body)).into_response()
        }
        RelayOutcome::Streaming { status, body } => Response::builder()
            .status(status_code(status))
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .body(Body::from_stream(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        RelayOutcome::Rejected {
            status,
            content_type,
            body,
        } => {
            let mut builder = Response::builder().status(status_code(status));
            if let Some(content_type) = content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}
