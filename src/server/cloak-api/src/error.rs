//! API error types and their HTTP rendering.

use axum::extract::rejection::BytesRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use cloak_signing::ProxyError;

/// Errors returned to API callers.
///
/// Display strings are the exact `error` messages sent to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required field missing, empty, or body not JSON.
    #[error("{0}")]
    Validation(String),

    /// Too many verification attempts from this client.
    #[error("Too many verification attempts. Please slow down.")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The vault refused the verification request.
    #[error("Invalid signature or malformed request.")]
    InvalidSignature,

    /// An operation could not be completed by the vault.
    #[error("{operation} failed: {reason}")]
    OperationFailed {
        /// Operation name, e.g. `Encryption`.
        operation: &'static str,
        /// Short failure class.
        reason: &'static str,
    },

    /// Request body over the size limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// No such route.
    #[error("Not found")]
    NotFound,

    /// The route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Unclassified failure.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::OperationFailed { .. } | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(value: ProxyError) -> Self {
        let reason = value.backend().kind_label();
        match &value {
            ProxyError::VerificationFailed(e) => {
                warn!(error = %e, "Vault rejected verification");
                return ApiError::InvalidSignature;
            },
            other => error!(error = %other.backend(), "{other}"),
        }

        let operation = match value {
            ProxyError::EncryptionFailed(_) => "Encryption",
            ProxyError::DecryptionFailed(_) => "Decryption",
            ProxyError::SigningFailed(_) => "Signing",
            ProxyError::VerificationFailed(_) | ProxyError::VerificationUnavailable(_) => {
                "Verification"
            },
        };

        ApiError::OperationFailed { operation, reason }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        warn!(error = %rejection, "Failed to read request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::validation("Invalid request body")
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match self {
            Self::RateLimited { retry_after_secs } => Some(retry_after_secs),
            _ => None,
        };

        let body = Json(ErrorBody {
            error: self.to_string(),
            retry_after,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
