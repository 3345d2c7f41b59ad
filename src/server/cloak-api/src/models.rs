//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Body of `/encrypt` and `/sign`.
#[derive(Debug, Default, Deserialize)]
pub struct TextRequest {
    /// Text to encrypt or sign.
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `/decrypt`.
#[derive(Debug, Default, Deserialize)]
pub struct DecryptRequest {
    /// Ciphertext returned by `/encrypt`.
    #[serde(default)]
    pub ciphertext: Option<String>,
}

/// Body of `/verify`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    /// Text that was signed.
    #[serde(default)]
    pub text: Option<String>,
    /// Signature returned by `/sign`.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Response of `/encrypt`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CiphertextResponse {
    /// Opaque vault ciphertext.
    pub ciphertext: String,
}

/// Response of `/decrypt`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaintextResponse {
    /// Recovered text.
    pub plaintext: String,
}

/// Response of `/sign`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignatureResponse {
    /// Opaque vault signature.
    pub signature: String,
}

/// Response of `/verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the signature matches the text.
    pub valid: bool,
}

/// Response of `/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Server version.
    pub version: String,
}
