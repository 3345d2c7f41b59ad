//! Caller identity used for rate limiting.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::AppState;

/// Header set by reverse proxies with the original client address.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Bucket used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit key of the caller: its IP address.
///
/// The first `X-Forwarded-For` address wins when the server is configured
/// to trust it; otherwise the TCP peer address is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR_HEADER)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for {
            if let Some(ip) = forwarded_ip(&parts.headers) {
                return Ok(ClientKey(ip.to_string()));
            }
        }

        match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => Ok(ClientKey(addr.ip().to_string())),
            None => {
                debug!("No peer address on request");
                Ok(ClientKey(UNKNOWN_CLIENT.to_string()))
            },
        }
    }
}
