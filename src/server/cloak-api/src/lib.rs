//! # Cloak API
//!
//! REST layer in front of the crypto proxy.
//!
//! ## Endpoints
//!
//! - `POST /encrypt` - `{text}` -> `{ciphertext}`
//! - `POST /decrypt` - `{ciphertext}` -> `{plaintext}`
//! - `POST /sign` - `{text}` -> `{signature}`
//! - `POST /verify` - `{text, signature}` -> `{valid}`, rate limited per client
//! - `GET /health` - liveness, never touches the vault
//!
//! Errors are JSON `{"error": "..."}` bodies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod models;

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use cloak_limiter::RateLimiter;
use cloak_signing::CryptoProxy;

pub use client::ClientKey;
pub use error::ApiError;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The crypto proxy service.
    pub proxy: Arc<CryptoProxy>,
    /// Limiter gating `/verify`.
    pub limiter: Arc<dyn RateLimiter>,
    /// Use `X-Forwarded-For` as the client address.
    pub trust_forwarded_for: bool,
}

/// Builds the API router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// verify limiter can key on the peer address.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/encrypt", post(handlers::encrypt))
        .route("/decrypt", post(handlers::decrypt))
        .route("/sign", post(handlers::sign))
        .route("/verify", post(handlers::verify));

    with_error_boundary(routes).with_state(state)
}

/// Every failure outside the handlers becomes a JSON error: unknown routes,
/// wrong methods and panics.
fn with_error_boundary(routes: Router<AppState>) -> Router<AppState> {
    routes
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(TraceLayer::new_for_http())
}
