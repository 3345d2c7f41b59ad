//! Integration tests for Cloak server.
//!
//! These tests run the complete server in-process against a mock vault and
//! drive it over HTTP.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use cloak_server::{Server, ServerConfig};

pub const VAULT_TOKEN: &str = "s.integration-token";
pub const DEK_KEY: &str = "app-dek";
pub const SIGN_KEY: &str = "app-sign";
pub const SALT_PATH: &str = "secret/data/app";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CiphertextResponse {
    pub ciphertext: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaintextResponse {
    pub plaintext: String,
}

#[derive(Debug, Deserialize)]
pub struct SignatureResponse {
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub retry_after: Option<u64>,
}

// ============================================================================
// Mock Vault
// ============================================================================

/// Stateless transit engine imitation.
///
/// Ciphertexts and signatures embed the base64 payload behind a `vault:v1:`
/// prefix, so they round-trip and are bound to the exact input bytes.
pub struct FakeVault {
    salt: Option<String>,
}

const PREFIX: &str = "vault:v1:";

fn vault_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] }))
}

fn data(value: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": value }))
}

impl Respond for FakeVault {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let token = request
            .headers
            .get("x-vault-token")
            .and_then(|v| v.to_str().ok());
        if token != Some(VAULT_TOKEN) {
            return vault_error(403, "permission denied");
        }

        let path = request.url.path().trim_start_matches("/v1/").to_string();
        if request.method.as_str() == "GET" {
            return match (&self.salt, path == SALT_PATH) {
                (Some(salt), true) => data(json!({ "data": { "app_salt": salt } })),
                (None, true) => data(json!({ "data": {} })),
                _ => vault_error(404, "not found"),
            };
        }

        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return vault_error(400, "failed to parse JSON input"),
        };
        let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();

        match path.split('/').collect::<Vec<_>>().as_slice() {
            ["transit", "encrypt", DEK_KEY] => {
                data(json!({ "ciphertext": format!("{PREFIX}{}", field("plaintext")) }))
            },
            ["transit", "decrypt", DEK_KEY] => match field("ciphertext").strip_prefix(PREFIX) {
                Some(plaintext) => data(json!({ "plaintext": plaintext })),
                None => vault_error(400, "invalid ciphertext: no prefix"),
            },
            ["transit", "sign", SIGN_KEY] => {
                data(json!({ "signature": format!("{PREFIX}{}", field("input")) }))
            },
            ["transit", "verify", SIGN_KEY] => match field("signature").strip_prefix(PREFIX) {
                Some(signed) => data(json!({ "valid": signed == field("input") })),
                None => vault_error(400, "invalid signature: missing version prefix"),
            },
            ["transit", _, _] => vault_error(400, "encryption key not found"),
            _ => vault_error(404, "unsupported path"),
        }
    }
}

// ============================================================================
// Test Environment
// ============================================================================

/// Options for [`TestEnv::start`].
#[derive(Debug, Clone)]
pub struct EnvOptions {
    pub salt: Option<String>,
    pub sign_key: String,
    pub verify_limit: u32,
    pub verify_window_secs: u64,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            salt: Some("pepper".to_string()),
            sign_key: SIGN_KEY.to_string(),
            verify_limit: 10,
            verify_window_secs: 60,
        }
    }
}

fn server_config(vault_addr: String, options: &EnvOptions) -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        vault_addr,
        vault_token: VAULT_TOKEN.to_string(),
        dek_key: DEK_KEY.to_string(),
        sign_key: options.sign_key.clone(),
        salt_path: SALT_PATH.to_string(),
        vault_timeout_secs: 5,
        verify_limit: options.verify_limit,
        verify_window_secs: options.verify_window_secs,
        trust_forwarded_for: false,
    }
}

/// Starts a mock vault answering with [`FakeVault`].
pub async fn start_vault(salt: Option<&str>) -> MockServer {
    let vault = MockServer::start().await;
    Mock::given(any())
        .respond_with(FakeVault {
            salt: salt.map(str::to_string),
        })
        .mount(&vault)
        .await;
    vault
}

/// Builds a server against `vault` without starting it.
pub async fn build_server(vault: &MockServer, options: &EnvOptions) -> Result<Server> {
    Server::build(server_config(vault.uri(), options)).await
}

/// A running server with its own mock vault.
pub struct TestEnv {
    pub vault: MockServer,
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestEnv {
    /// Starts a server with default options.
    pub async fn start() -> Result<Self> {
        Self::start_with(EnvOptions::default()).await
    }

    /// Starts a server on an ephemeral port.
    pub async fn start_with(options: EnvOptions) -> Result<Self> {
        let vault = start_vault(options.salt.as_deref()).await;
        let server = build_server(&vault, &options).await?;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind test listener")?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            vault,
            base_url,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> CloakClient {
        CloakClient::new(&self.base_url)
    }

    /// Number of requests the mock vault has received.
    pub async fn vault_requests(&self) -> usize {
        self.vault
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or_default()
    }

    /// Stops the server and waits for it to exit.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        Ok(())
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Cloak API.
pub struct CloakClient {
    client: Client,
    base_url: String,
}

impl CloakClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Posts a raw JSON body and returns the response.
    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(&body).send().await?)
    }

    pub async fn encrypt(&self, text: &str) -> Result<CiphertextResponse> {
        let resp = self.post_json("/encrypt", json!({ "text": text })).await?;
        anyhow::ensure!(resp.status().is_success(), "Encrypt failed: {}", resp.text().await?);
        Ok(resp.json().await?)
    }

    pub async fn decrypt(&self, ciphertext: &str) -> Result<PlaintextResponse> {
        let resp = self
            .post_json("/decrypt", json!({ "ciphertext": ciphertext }))
            .await?;
        anyhow::ensure!(resp.status().is_success(), "Decrypt failed: {}", resp.text().await?);
        Ok(resp.json().await?)
    }

    pub async fn sign(&self, text: &str) -> Result<SignatureResponse> {
        let resp = self
            .post_json("/sign", serde_json::to_value(TextRequest { text: text.into() })?)
            .await?;
        anyhow::ensure!(resp.status().is_success(), "Sign failed: {}", resp.text().await?);
        Ok(resp.json().await?)
    }

    pub async fn verify(&self, text: &str, signature: &str) -> Result<VerifyResponse> {
        let resp = self
            .post_json("/verify", json!({ "text": text, "signature": signature }))
            .await?;
        anyhow::ensure!(resp.status().is_success(), "Verify failed: {}", resp.text().await?);
        Ok(resp.json().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_hello_scenario() {
        let env = TestEnv::start().await.unwrap();
        let client = env.client();

        let encrypted = client.encrypt("hello").await.unwrap();
        let decrypted = client.decrypt(&encrypted.ciphertext).await.unwrap();
        assert_eq!(decrypted.plaintext, "hello");

        let signed = client.sign("hello").await.unwrap();
        assert!(client.verify("hello", &signed.signature).await.unwrap().valid);
        assert!(!client.verify("world", &signed.signature).await.unwrap().valid);

        env.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unicode_round_trip() {
        let env = TestEnv::start().await.unwrap();
        let client = env.client();

        let text = "héllo wörld ✓ 你好";
        let encrypted = client.encrypt(text).await.unwrap();
        assert_eq!(client.decrypt(&encrypted.ciphertext).await.unwrap().plaintext, text);

        let signed = client.sign(text).await.unwrap();
        assert!(client.verify(text, &signed.signature).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_signature_rejected_by_process_with_other_salt() {
        let first = TestEnv::start().await.unwrap();
        let signed = first.client().sign("hello").await.unwrap();

        let second = TestEnv::start_with(EnvOptions {
            salt: Some("paprika".into()),
            ..EnvOptions::default()
        })
        .await
        .unwrap();
        let result = second.client().verify("hello", &signed.signature).await.unwrap();
        assert!(!result.valid);

        // A restart with the same salt still accepts it.
        let third = TestEnv::start().await.unwrap();
        let result = third.client().verify("hello", &signed.signature).await.unwrap();
        assert!(result.valid);
    }

    #[tokio::test]
    async fn test_startup_fails_without_salt() {
        let vault = start_vault(None).await;
        let result = build_server(
            &vault,
            &EnvOptions {
                salt: None,
                ..EnvOptions::default()
            },
        )
        .await;

        let err = result.err().expect("server must not start without a salt");
        assert!(format!("{err:#}").contains("salt"));
    }

    #[tokio::test]
    async fn test_startup_fails_with_empty_salt() {
        let vault = start_vault(Some("")).await;
        let result = build_server(&vault, &EnvOptions::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_startup_fails_when_vault_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = server_config(format!("http://{addr}"), &EnvOptions::default());
        let result = Server::build(config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_text_never_reaches_vault() {
        let env = TestEnv::start().await.unwrap();
        let client = env.client();
        let baseline = env.vault_requests().await;

        for path in ["/encrypt", "/sign"] {
            let resp = client.post_json(path, json!({ "text": "" })).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let error: ErrorResponse = resp.json().await.unwrap();
            assert_eq!(error.error, "Missing \"text\"");
        }

        assert_eq!(env.vault_requests().await, baseline);
    }

    #[tokio::test]
    async fn test_verify_rate_limit() {
        let env = TestEnv::start_with(EnvOptions {
            verify_limit: 3,
            ..EnvOptions::default()
        })
        .await
        .unwrap();
        let client = env.client();
        let signed = client.sign("hello").await.unwrap();

        // Malformed requests do not count.
        for _ in 0..5 {
            let resp = client
                .post_json("/verify", json!({ "text": "hello" }))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        for _ in 0..3 {
            assert!(client.verify("hello", &signed.signature).await.unwrap().valid);
        }

        let resp = client
            .post_json("/verify", json!({ "text": "hello", "signature": signed.signature }))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let header: u64 = resp.headers()["retry-after"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&header));

        let error: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(error.retry_after, Some(header));

        // Signing is not throttled.
        assert!(client.sign("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_accepts_again_after_window() {
        let env = TestEnv::start_with(EnvOptions {
            verify_limit: 1,
            verify_window_secs: 1,
            ..EnvOptions::default()
        })
        .await
        .unwrap();
        let client = env.client();
        let signed = client.sign("hello").await.unwrap();

        assert!(client.verify("hello", &signed.signature).await.unwrap().valid);

        let resp = client
            .post_json("/verify", json!({ "text": "hello", "signature": signed.signature }))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let error: ErrorResponse = resp.json().await.unwrap();
        let wait = error.retry_after.unwrap();
        assert_eq!(wait, 1);

        tokio::time::sleep(Duration::from_millis(wait * 1000 + 100)).await;
        assert!(client.verify("hello", &signed.signature).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_malformed_signature_is_bad_request() {
        let env = TestEnv::start().await.unwrap();
        let resp = env
            .client()
            .post_json("/verify", json!({ "text": "hello", "signature": "garbage" }))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(error.error, "Invalid signature or malformed request.");
    }

    #[tokio::test]
    async fn test_vault_rejection_on_sign_is_server_error() {
        let env = TestEnv::start_with(EnvOptions {
            sign_key: "missing-key".into(),
            ..EnvOptions::default()
        })
        .await
        .unwrap();

        let resp = env
            .client()
            .post_json("/sign", json!({ "text": "hello" }))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(error.error, "Signing failed: backend rejected the request");
        assert!(!error.error.contains("encryption key not found"));
    }

    #[tokio::test]
    async fn test_every_vault_request_is_authenticated() {
        let env = TestEnv::start().await.unwrap();
        let client = env.client();
        let signed = client.sign("hello").await.unwrap();
        client.verify("hello", &signed.signature).await.unwrap();

        let requests = env.vault.received_requests().await.unwrap();
        assert!(requests.len() >= 3);
        for request in requests {
            assert_eq!(request.headers["x-vault-token"], VAULT_TOKEN);
        }
    }
}
