//! Signing service error types.

use cloak_vault::BackendError;
use thiserror::Error;

/// Errors raised while loading the application salt.
#[derive(Debug, Error)]
pub enum SaltError {
    /// The vault could not be read.
    #[error("failed to fetch salt: {0}")]
    Fetch(#[source] BackendError),

    /// The secret exists but carries no salt field.
    #[error("salt not found at {0}")]
    Missing(String),

    /// The salt field is present but empty.
    #[error("salt at {0} is empty")]
    Empty(String),
}

/// Errors returned by [`CryptoProxy`](crate::CryptoProxy) operations.
///
/// Display output only carries the failure class, never vault text; the
/// underlying [`BackendError`] is available through `source()`.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Encryption was not performed.
    #[error("encryption failed: {}", .0.kind_label())]
    EncryptionFailed(#[source] BackendError),

    /// Decryption was not performed or yielded unusable plaintext.
    #[error("decryption failed: {}", .0.kind_label())]
    DecryptionFailed(#[source] BackendError),

    /// Signing was not performed.
    #[error("signing failed: {}", .0.kind_label())]
    SigningFailed(#[source] BackendError),

    /// The vault rejected the verification request (malformed signature,
    /// unknown key version, ...).
    #[error("verification failed: {}", .0.kind_label())]
    VerificationFailed(#[source] BackendError),

    /// The verification could not be carried out at all.
    #[error("verification unavailable: {}", .0.kind_label())]
    VerificationUnavailable(#[source] BackendError),
}

impl ProxyError {
    /// Returns the backend failure behind this error.
    pub fn backend(&self) -> &BackendError {
        match self {
            Self::EncryptionFailed(e)
            | Self::DecryptionFailed(e)
            | Self::SigningFailed(e)
            | Self::VerificationFailed(e)
            | Self::VerificationUnavailable(e) => e,
        }
    }
}
