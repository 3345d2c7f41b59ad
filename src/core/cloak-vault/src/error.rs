//! Vault client error types.

use thiserror::Error;

/// Failure of a single round trip with the vault.
///
/// Every variant keeps the vault's own wording for logs; callers facing
/// end users should present [`BackendError::kind_label`] instead.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure: connection refused, DNS, TLS or timeout.
    #[error("vault unavailable: {0}")]
    Unavailable(String),

    /// The vault answered with a 4xx status.
    #[error("vault rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the vault.
        status: u16,
        /// Error messages from the vault response body.
        message: String,
    },

    /// The vault answered with a 5xx or otherwise unexpected status.
    #[error("vault error ({status}): {message}")]
    Server {
        /// HTTP status code returned by the vault.
        status: u16,
        /// Error messages from the vault response body.
        message: String,
    },

    /// Successful status but the body could not be decoded.
    #[error("invalid vault response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns true when the vault refused the request as malformed or unauthorized.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Short, caller-safe description of the failure class.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "backend unavailable",
            Self::Rejected { .. } => "backend rejected the request",
            Self::Server { .. } => "backend error",
            Self::Decode(_) => "invalid backend response",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}
