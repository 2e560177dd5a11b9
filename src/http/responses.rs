//! HTTP request and response types for the deployment API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tracing::warn;

use crate::types::{Environment, Error, ImageSet};

/// Body of POST /deploy
///
/// Every field is optional at the serde level so that a missing field is
/// reported by name instead of as a generic decoding error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Free-form trigger label, required but not interpreted
    pub action: Option<String>,
    pub environment: Option<String>,
    pub images: Option<ImagesPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagesPayload {
    pub backend: Option<String>,
    pub frontend: Option<String>,
}

impl DeployRequest {
    /// Decode a request body. Bytes that are not JSON and JSON of the wrong
    /// shape are both bad requests, reported differently.
    pub fn from_body(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| match e.classify() {
            Category::Data => reject("body", "Invalid payload format"),
            Category::Syntax | Category::Eof | Category::Io => reject("body", "Invalid JSON"),
        })
    }

    /// Check required fields and resolve the target environment
    pub fn validate(self) -> Result<(Environment, ImageSet), Error> {
        if self.action.is_none() {
            return Err(reject("action", "Missing required field"));
        }
        let environment = self
            .environment
            .ok_or_else(|| reject("environment", "Missing required field"))?;
        let images = self
            .images
            .ok_or_else(|| reject("images", "Missing required field"))?;
        let backend = required_image(images.backend, "images.backend")?;
        let frontend = required_image(images.frontend, "images.frontend")?;

        let environment = environment.parse::<Environment>().map_err(|e| {
            warn!(field = "environment", value = %environment, "Invalid deployment request");
            e
        })?;

        Ok((environment, ImageSet { backend, frontend }))
    }
}

fn required_image(value: Option<String>, field: &str) -> Result<String, Error> {
    let image = match value {
        Some(image) => image.trim().to_string(),
        None => return Err(reject(field, "Missing required field")),
    };
    if image.is_empty() {
        return Err(reject(field, "Image reference cannot be empty"));
    }
    // Would be read as an option by the orchestration CLI
    if image.starts_with('-') {
        return Err(reject(field, "Image reference cannot start with '-'"));
    }
    Ok(image)
}

/// Log a rejected request and build the matching error
fn reject(field: &str, message: &str) -> Error {
    warn!(field = %field, reason = %message, "Invalid deployment request");
    Error::BadRequest {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn healthy(service: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.to_string(),
        }
    }
}

/// Returned once a deployment has been handed to its worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployStartedResponse {
    pub status: String,
}

impl Default for DeployStartedResponse {
    fn default() -> Self {
        Self {
            status: "deployment started".to_string(),
        }
    }
}

/// Standard error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &Error) -> Self {
        Self {
            error: error.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            error: "Not found".to_string(),
        }
    }
}

/// Convert error types to HTTP status codes
pub fn error_to_status_code(error: &Error) -> StatusCode {
    match error {
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = error_to_status_code(&self);
        (status_code, Json(ErrorResponse::new(&self))).into_response()
    }
}
