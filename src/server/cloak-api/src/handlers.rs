//! Endpoint handlers.

use std::any::Any;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::client::ClientKey;
use crate::models::{
    CiphertextResponse, DecryptRequest, HealthResponse, PlaintextResponse, SignatureResponse,
    TextRequest, VerifyRequest, VerifyResponse,
};
use crate::{ApiError, AppState};

/// Request body as read by axum; oversized or unreadable bodies are rejected.
type RawBody = Result<Bytes, BytesRejection>;

/// Parses a JSON body; an empty body counts as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: RawBody) -> Result<T, ApiError> {
    let body = body?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&body).map_err(|_| ApiError::validation("Invalid JSON body"))
}

/// `None` and `""` are both missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub(crate) async fn encrypt(
    State(state): State<AppState>,
    body: RawBody,
) -> Result<Json<CiphertextResponse>, ApiError> {
    let request: TextRequest = parse_body(body)?;
    let text = present(request.text).ok_or_else(|| ApiError::validation("Missing \"text\""))?;

    let ciphertext = state.proxy.encrypt(&text).await?;
    Ok(Json(CiphertextResponse { ciphertext }))
}

pub(crate) async fn decrypt(
    State(state): State<AppState>,
    body: RawBody,
) -> Result<Json<PlaintextResponse>, ApiError> {
    let request: DecryptRequest = parse_body(body)?;
    let ciphertext = present(request.ciphertext)
        .ok_or_else(|| ApiError::validation("Missing \"ciphertext\""))?;

    let plaintext = state.proxy.decrypt(&ciphertext).await?;
    Ok(Json(PlaintextResponse { plaintext }))
}

pub(crate) async fn sign(
    State(state): State<AppState>,
    body: RawBody,
) -> Result<Json<SignatureResponse>, ApiError> {
    let request: TextRequest = parse_body(body)?;
    let text = present(request.text).ok_or_else(|| ApiError::validation("Missing \"text\""))?;

    let signature = state.proxy.sign(&text).await?;
    Ok(Json(SignatureResponse { signature }))
}

/// Fields are validated before a rate-limit slot is consumed, so malformed
/// requests never count against the caller.
pub(crate) async fn verify(
    State(state): State<AppState>,
    client: ClientKey,
    body: RawBody,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request: VerifyRequest = parse_body(body)?;
    let (Some(text), Some(signature)) = (present(request.text), present(request.signature))
    else {
        return Err(ApiError::validation("Missing \"text\" or \"signature\""));
    };

    let decision = state.limiter.consume(client.as_str()).await;
    if !decision.accepted {
        info!(client = client.as_str(), "Verification throttled");
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        });
    }

    let valid = state.proxy.verify(&text, &signature).await?;
    Ok(Json(VerifyResponse { valid }))
}

pub(crate) async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub(crate) fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");
    ApiError::Internal.into_response()
}
