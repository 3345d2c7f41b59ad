//! # Cloak Server
//!
//! Startup wiring: vault client, salt loading, limiter, HTTP listener.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

pub use config::ServerConfig;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use zeroize::Zeroizing;

use cloak_api::AppState;
use cloak_limiter::FixedWindowLimiter;
use cloak_signing::CryptoProxy;
use cloak_vault::{VaultClient, VaultConfig};

/// A fully initialized server, ready to accept connections.
pub struct Server {
    state: AppState,
    limiter: Arc<FixedWindowLimiter>,
}

impl Server {
    /// Validates the configuration, connects to the vault and loads the salt.
    ///
    /// Fails if the salt cannot be loaded, so the process never serves
    /// requests unsalted.
    pub async fn build(mut config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let token = Zeroizing::new(std::mem::take(&mut config.vault_token));
        let vault_config = VaultConfig {
            addr: config.vault_addr.clone(),
            token,
            timeout: config.vault_timeout(),
        };
        info!(addr = %vault_config.addr, "Connecting to vault");

        let vault = VaultClient::new(vault_config).context("Failed to create vault client")?;
        let proxy = CryptoProxy::new(Arc::new(vault), config.proxy_config())
            .await
            .context("Failed to load application salt")?;

        let limiter = Arc::new(
            FixedWindowLimiter::new(config.limiter_config())
                .context("Invalid verification rate limit")?,
        );
        info!(
            limit = config.verify_limit,
            window_secs = config.verify_window_secs,
            trust_forwarded_for = config.trust_forwarded_for,
            "Verification rate limit configured"
        );

        let state = AppState {
            proxy: Arc::new(proxy),
            limiter: limiter.clone(),
            trust_forwarded_for: config.trust_forwarded_for,
        };

        Ok(Self { state, limiter })
    }

    /// Returns the API router.
    pub fn router(&self) -> Router {
        cloak_api::router(self.state.clone())
    }

    /// Serves requests on `listener` until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pruning = self.limiter.clone().spawn_pruning();
        let app = self.router();

        info!(addr = %listener.local_addr()?, "Cloak server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

        pruning.abort();
        Ok(())
    }
}
