use authz::AuthzError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// API Error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Denied without a WebID; the challenge names `realm`.
    #[error("Unauthorized")]
    Unauthorized { realm: String },

    #[error("Forbidden")]
    Forbidden,

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable")]
    ServiceUnavailable,

    /// The detail is logged, never sent.
    #[error("Internal server error")]
    InternalError(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for the error type
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Server-side failures carry no message to the client.
    fn public_message(&self) -> Option<String> {
        match self {
            ApiError::InternalError(_) | ApiError::ServiceUnavailable => None,
            other => Some(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(detail) = &self {
            error!("Internal error during authorization: {}", detail);
        }

        let status = self.status_code();
        let error_response = ApiErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.public_message(),
            },
        };
        let mut response = (status, Json(error_response)).into_response();

        if let ApiError::Unauthorized { realm } = &self {
            let challenge = format!("DPoP realm=\"{realm}\", Bearer realm=\"{realm}\"");
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

/// Convert authorization failures to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::DeadlineExceeded => ApiError::ServiceUnavailable,
            AuthzError::UnsupportedMethod(method) => ApiError::MethodNotAllowed(method),
            AuthzError::InvalidIdentifier(id) => ApiError::BadRequest(id),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
