//! API error types and error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use policy_functions_executor::ModeError;
use policy_functions_packager::PackageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Provisioning timed out: {0}")]
    Timeout(String),

    #[error("Target unavailable: {0}")]
    Unavailable(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ModeError> for ApiError {
    fn from(err: ModeError) -> Self {
        match err {
            ModeError::Configuration(_) => ApiError::BadRequest(err.to_string()),
            ModeError::Packaging(PackageError::MissingSchedule(_)) => ApiError::BadRequest(err.to_string()),
            ModeError::Provisioning(_) => ApiError::Provisioning(err.to_string()),
            ModeError::ProvisioningTimeout { .. } => ApiError::Timeout(err.to_string()),
            ModeError::UnhealthyTarget { .. } => ApiError::Unavailable(err.to_string()),
            ModeError::Unsupported { .. } => ApiError::NotImplemented(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Provisioning(_) => (StatusCode::BAD_GATEWAY, "provisioning_error"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "provisioning_timeout"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy_target"),
            ApiError::NotImplemented(_) => (StatusCode::NOT_IMPLEMENTED, "unsupported"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
