//! HTTP endpoint handlers for the deployment API

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::Config,
    http::responses::*,
    tasks::DeploymentDispatcher,
    types::Error,
};

/// Response header carrying the id of the queued deployment
pub const DEPLOY_ID_HEADER: &str = "x-deploy-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub dispatcher: DeploymentDispatcher,
}

/// POST /deploy - Accept a deployment and hand it to the background worker.
/// Runs behind the bearer auth middleware.
pub async fn handle_deploy(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    let request = DeployRequest::from_body(&body)?;
    let (environment, images) = request.validate()?;

    info!(
        environment = %environment,
        backend = %images.backend,
        frontend = %images.frontend,
        "Received deployment request"
    );

    let deploy_id = state
        .dispatcher
        .submit(environment, images)
        .inspect_err(|e| warn!(error = %e, "Deployment not queued"))?;

    Ok((
        StatusCode::OK,
        [(DEPLOY_ID_HEADER, deploy_id)],
        Json(DeployStartedResponse::default()),
    ))
}

/// GET /health - Liveness check, no authentication
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse::healthy(&state.config.server.service_name))
}

/// Fallback handler for unknown paths and unsupported methods
pub async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::not_found()))
}
