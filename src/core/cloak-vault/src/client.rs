//! HTTP implementation of [`TransitBackend`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::{BackendError, TransitBackend};

/// Header carrying the vault token on every request.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Field of the KV secret holding the application salt.
pub const SALT_FIELD: &str = "app_salt";

/// Vault connection settings.
#[derive(Clone)]
pub struct VaultConfig {
    /// Base address, e.g. `http://127.0.0.1:8200`.
    pub addr: String,
    /// Token sent in [`TOKEN_HEADER`].
    pub token: Zeroizing<String>,
    /// Per-request timeout; exceeding it yields [`BackendError::Unavailable`].
    pub timeout: Duration,
}

impl VaultConfig {
    /// Creates a configuration with the default 10 second timeout.
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: Zeroizing::new(token.into()),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("addr", &self.addr)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CiphertextData {
    ciphertext: String,
}

#[derive(Deserialize)]
struct PlaintextData {
    plaintext: String,
}

#[derive(Deserialize)]
struct SignatureData {
    signature: String,
}

#[derive(Deserialize)]
struct VerifyData {
    #[serde(default)]
    valid: bool,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

// ============================================================================
// Vault Client
// ============================================================================

/// Authenticated HTTP client for the vault's KV and transit engines.
pub struct VaultClient {
    http: Client,
    addr: String,
    token: Zeroizing<String>,
}

impl VaultClient {
    /// Creates a new client from the given configuration.
    pub fn new(config: VaultConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            addr: config.addr.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Sends an authenticated request and decodes the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, BackendError> {
        let response = request
            .header(TOKEN_HEADER, self.token.as_str())
            .send()
            .await
            .map_err(|e| {
                warn!(path, error = %e, "Vault request failed");
                BackendError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body).map_err(|e| {
                warn!(path, error = %e, "Undecodable vault response");
                BackendError::Decode(e.to_string())
            });
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .unwrap_or_default()
            .errors
            .join("; ");

        if status.is_client_error() {
            warn!(path, status = status.as_u16(), %message, "Vault rejected request");
            Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            })
        } else {
            warn!(path, status = status.as_u16(), %message, "Vault returned an error");
            Err(BackendError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, BackendError> {
        let request = self.http.post(self.url(path)).json(&body);
        self.send(request, path).await
    }
}

#[async_trait]
impl TransitBackend for VaultClient {
    #[instrument(skip(self))]
    async fn fetch_secret(&self, path: &str) -> Result<Option<String>, BackendError> {
        let body: serde_json::Value = self.send(self.http.get(self.url(path)), path).await?;

        let value = body
            .pointer(&format!("/data/data/{SALT_FIELD}"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        if value.is_none() {
            warn!(path, field = SALT_FIELD, "Secret field missing");
        }

        Ok(value)
    }

    #[instrument(skip(self, plaintext), fields(len = plaintext.len()))]
    async fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<String, BackendError> {
        let path = format!("transit/encrypt/{key}");
        let body = json!({ "plaintext": BASE64.encode(plaintext) });

        let response: Envelope<CiphertextData> = self.post(&path, body).await?;
        debug!("Encrypted payload");
        Ok(response.data.ciphertext)
    }

    #[instrument(skip(self, ciphertext))]
    async fn decrypt(&self, key: &str, ciphertext: &str) -> Result<Vec<u8>, BackendError> {
        let path = format!("transit/decrypt/{key}");
        let body = json!({ "ciphertext": ciphertext });

        let response: Envelope<PlaintextData> = self.post(&path, body).await?;
        let plaintext = Zeroizing::new(response.data.plaintext);
        BASE64
            .decode(plaintext.as_bytes())
            .map_err(|e| BackendError::Decode(format!("plaintext is not base64: {e}")))
    }

    #[instrument(skip(self, input), fields(len = input.len()))]
    async fn sign(&self, key: &str, input: &[u8]) -> Result<String, BackendError> {
        let path = format!("transit/sign/{key}");
        let body = json!({ "input": BASE64.encode(input) });

        let response: Envelope<SignatureData> = self.post(&path, body).await?;
        debug!("Signed payload");
        Ok(response.data.signature)
    }

    #[instrument(skip(self, input, signature), fields(len = input.len()))]
    async fn verify(
        &self,
        key: &str,
        input: &[u8],
        signature: &str,
    ) -> Result<bool, BackendError> {
        let path = format!("transit/verify/{key}");
        let body = json!({
            "input": BASE64.encode(input),
            "signature": signature,
        });

        let response: Envelope<VerifyData> = self.post(&path, body).await?;
        debug!(valid = response.data.valid, "Verified payload");
        Ok(response.data.valid)
    }

    fn name(&self) -> &'static str {
        "vault"
    }
}
