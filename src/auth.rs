//! Bearer-token check applied to every route.
//!
//! The proxy has a single credential: the upstream API key. Clients must
//! present exactly that key.

use crate::error::ErrorBody;
use crate::server::AppState;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader,
    InvalidKey,
}

impl AuthError {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "Missing or invalid Authorization header",
            Self::InvalidKey => "Invalid API key",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(self.message()))).into_response()
    }
}

/// Validate an `Authorization` header value against the expected key.
pub fn check_bearer(header: Option<&HeaderValue>, expected: &str) -> Result<(), AuthError> {
    let token = header
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingHeader)?;

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::InvalidKey)
    }
}

pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match check_bearer(
        request.headers().get(AUTHORIZATION),
        &state.upstream.api_key,
    ) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            state.logger.warn(
                "auth",
                format!("Rejected {} {}: {}", request.method(), request.uri().path(), err.message()),
            );
            err.into_response()
        }
    }
}
