//! Bearer token authentication for the deploy endpoint
//!
//! Callers present `Authorization: Bearer <token>`. The token is compared to
//! the configured secret in constant time. Rejections carry no detail about
//! the expected value.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{config::SecretToken, http::handlers::AppState, types::Error};

const BEARER_PREFIX: &str = "Bearer ";

/// Check the `Authorization` header against the configured token
pub fn verify_bearer(headers: &HeaderMap, expected: &SecretToken) -> Result<(), Error> {
    let presented = match extract_bearer_token(headers) {
        Some(token) => token,
        None => {
            warn!("Deploy request missing bearer authorization header");
            return Err(Error::Unauthorized("Unauthorized".to_string()));
        }
    };

    if !expected.matches(presented) {
        warn!("Deploy request presented an invalid token");
        return Err(Error::Unauthorized("Invalid token".to_string()));
    }

    debug!("Bearer token accepted");
    Ok(())
}

/// Axum middleware guarding routes that trigger deployments
pub async fn bearer_auth_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    verify_bearer(request.headers(), &app_state.config.auth.token)?;
    Ok(next.run(request).await)
}

/// Token following the exact `Bearer ` prefix, if the header has one
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
}
