//! API error types.
//!
//! Every variant maps to one HTTP status.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(ApiError::NotFound { .. })`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::store::store::StoreError;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested record does not exist.
    #[error("{message}")]
    NotFound { message: String },

    /// Malformed input: body, path segment or header.
    #[error("{message}")]
    BadRequest { message: String },

    /// `Content-Type` present but not `application/json`.
    #[error("expect application/json Content-Type")]
    UnsupportedMediaType,

    /// HTTP method not allowed for this resource.
    #[error("method {method} not allowed")]
    MethodNotAllowed { method: String },

    /// Missing or invalid credentials.
    #[error("Unauthorized")]
    Unauthorized { realm: String },

    /// The store cannot accept more records.
    #[error("food store is full")]
    ServiceUnavailable,

    /// Catch-all for unexpected internal errors.
    #[error("Internal Server Error")]
    InternalError(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NotFound",
            ApiError::BadRequest { .. } => "BadRequest",
            ApiError::UnsupportedMediaType => "UnsupportedMediaType",
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::Unauthorized { .. } => "Unauthorized",
            ApiError::ServiceUnavailable => "ServiceUnavailable",
            ApiError::InternalError(_) => "InternalError",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound {
                message: err.to_string(),
            },
            StoreError::IdsExhausted => ApiError::ServiceUnavailable,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();

        if let ApiError::InternalError(err) = &self {
            error!(request_id = %request_id, "internal error: {err:?}");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            request_id: request_id.clone(),
        };
        let body = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"code":"InternalError","message":"Internal Server Error"}"#.to_string()
        });

        let mut response = (
            status,
            [
                ("content-type", "application/json".to_string()),
                ("x-request-id", request_id),
            ],
            body,
        )
            .into_response();

        if let ApiError::Unauthorized { realm } = &self {
            let challenge = format!("Basic realm=\"{realm}\"");
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::UnsupportedMediaType.status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::MethodNotAllowed {
                method: "PUT".to_string()
            }
            .status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::InternalError(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ApiError = StoreError::NotFound { id: 7 }.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "food with id=7 not found");

        let err: ApiError = StoreError::IdsExhausted.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let resp = ApiError::Unauthorized {
            realm: "api".to_string(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"api\""
        );
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::InternalError(anyhow::anyhow!("secret detail"));
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
