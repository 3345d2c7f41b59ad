//! The crypto proxy service.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cloak_vault::{BackendError, TransitBackend};

use crate::{ProxyError, Salt, SaltError};

/// Key names and secret path used by the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Transit key used for encrypt/decrypt.
    pub dek_key: String,
    /// Transit key used for sign/verify.
    pub sign_key: String,
    /// KV path holding the application salt.
    pub salt_path: String,
}

/// Encrypt, decrypt, sign and verify through the vault.
///
/// Built once per process; the salt is loaded during construction and is
/// read-only afterwards, so the service can be shared behind an `Arc`.
pub struct CryptoProxy {
    backend: Arc<dyn TransitBackend>,
    config: ProxyConfig,
    salt: Salt,
}

impl CryptoProxy {
    /// Creates the service, fetching the salt from the vault.
    ///
    /// Fails if the salt cannot be loaded; the proxy never runs unsalted.
    pub async fn new(
        backend: Arc<dyn TransitBackend>,
        config: ProxyConfig,
    ) -> Result<Self, SaltError> {
        let salt = Salt::load(backend.as_ref(), &config.salt_path).await?;

        info!(
            dek_key = %config.dek_key,
            sign_key = %config.sign_key,
            "Crypto proxy initialized"
        );

        Ok(Self::with_salt(backend, config, salt))
    }

    /// Creates the service with an already loaded salt.
    pub fn with_salt(backend: Arc<dyn TransitBackend>, config: ProxyConfig, salt: Salt) -> Self {
        Self {
            backend,
            config,
            salt,
        }
    }

    /// Returns the salt in use.
    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    /// Encrypts `plaintext` under the data-encryption key.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, ProxyError> {
        self.backend
            .encrypt(&self.config.dek_key, plaintext.as_bytes())
            .await
            .map_err(ProxyError::EncryptionFailed)
    }

    /// Decrypts a ciphertext produced by [`CryptoProxy::encrypt`].
    pub async fn decrypt(&self, ciphertext: &str) -> Result<String, ProxyError> {
        let plaintext = self
            .backend
            .decrypt(&self.config.dek_key, ciphertext)
            .await
            .map_err(ProxyError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| {
            warn!("Decrypted plaintext is not UTF-8");
            ProxyError::DecryptionFailed(BackendError::Decode(
                "plaintext is not valid UTF-8".into(),
            ))
        })
    }

    /// Signs `text ++ salt` under the signing key.
    pub async fn sign(&self, text: &str) -> Result<String, ProxyError> {
        let input = self.salt.salted(text);
        self.backend
            .sign(&self.config.sign_key, &input)
            .await
            .map_err(ProxyError::SigningFailed)
    }

    /// Verifies `signature` against `text ++ salt`.
    ///
    /// A signature that simply does not match is `Ok(false)`. A vault
    /// rejection (malformed signature, unknown key version) is
    /// [`ProxyError::VerificationFailed`]; any other failure is
    /// [`ProxyError::VerificationUnavailable`].
    pub async fn verify(&self, text: &str, signature: &str) -> Result<bool, ProxyError> {
        let input = self.salt.salted(text);
        let valid = self
            .backend
            .verify(&self.config.sign_key, &input, signature)
            .await
            .map_err(|e| {
                if e.is_rejected() {
                    ProxyError::VerificationFailed(e)
                } else {
                    ProxyError::VerificationUnavailable(e)
                }
            })?;

        debug!(valid, "Signature checked");
        Ok(valid)
    }
}
