//! # Cloak Vault
//!
//! Client for the remote key-management backend.
//!
//! ## Operations
//!
//! - KV read of the application salt (`GET /v1/<path>`)
//! - Transit encrypt / decrypt under the data-encryption key
//! - Transit sign / verify under the signing key
//!
//! Payloads are base64-encoded on the way out and decoded on the way back;
//! ciphertexts and signatures are opaque strings. Failures are classified
//! into [`BackendError`] so callers never inspect transport errors directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{VaultClient, VaultConfig, SALT_FIELD, TOKEN_HEADER};
pub use error::BackendError;

use async_trait::async_trait;

/// Transit-style key-management backend.
///
/// [`VaultClient`] is the HTTP implementation; tests substitute in-memory
/// backends.
#[async_trait]
pub trait TransitBackend: Send + Sync {
    /// Reads the salt field of the KV secret stored at `path`.
    ///
    /// Returns `Ok(None)` when the secret exists but the field is absent.
    async fn fetch_secret(&self, path: &str) -> Result<Option<String>, BackendError>;

    /// Encrypts `plaintext` under the named key, returning the opaque ciphertext.
    async fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<String, BackendError>;

    /// Decrypts a ciphertext produced by [`TransitBackend::encrypt`].
    async fn decrypt(&self, key: &str, ciphertext: &str) -> Result<Vec<u8>, BackendError>;

    /// Signs `input` under the named key, returning the opaque signature.
    async fn sign(&self, key: &str, input: &[u8]) -> Result<String, BackendError>;

    /// Checks `signature` against `input` under the named key.
    async fn verify(&self, key: &str, input: &[u8], signature: &str)
        -> Result<bool, BackendError>;

    /// Returns the name of this backend for logging.
    fn name(&self) -> &'static str;
}
