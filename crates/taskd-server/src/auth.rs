//! HTTP basic authentication middleware.
//!
//! Credentials are injected at startup through [`Credentials`]; requests
//! without a matching `Authorization: Basic` header are rejected before
//! they reach the task store.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Basic-auth credential pair, supplied by server configuration.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let msg = match self {
            AuthError::MissingCredentials => "missing credentials",
            AuthError::InvalidCredentials => "invalid credentials",
        };
        let body = serde_json::json!({ "error": msg });
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"taskd\"")],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Middleware that checks the `Authorization: Basic` header against the
/// configured credentials.
pub async fn require_basic_auth(
    State(credentials): State<Arc<Credentials>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let (username, password) = decode_basic(header_value)?;
    if !credentials.matches(&username, &password) {
        tracing::warn!(username, "rejected basic auth attempt");
        return Err(AuthError::InvalidCredentials);
    }

    Ok(next.run(request).await)
}

fn decode_basic(header_value: &str) -> Result<(String, String), AuthError> {
    let encoded = header_value
        .strip_prefix("Basic ")
        .ok_or(AuthError::InvalidCredentials)?;
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| AuthError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidCredentials)?;
    Ok((username.to_string(), password.to_string()))
}
