//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use cloak_limiter::FixedWindowConfig;
use cloak_signing::ProxyConfig;

/// Command line and environment configuration, fixed at startup.
#[derive(Parser, Clone)]
#[command(name = "cloak-server")]
#[command(about = "Cloak - vault transit proxy with salted signing")]
#[command(version)]
pub struct ServerConfig {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "CLOAK_BIND_ADDRESS")]
    pub bind: SocketAddr,

    /// Vault base address
    #[arg(long, default_value = "http://127.0.0.1:8200", env = "VAULT_ADDR")]
    pub vault_addr: String,

    /// Vault token
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: String,

    /// Transit key used for encrypt/decrypt
    #[arg(long, default_value = "app-dek", env = "CLOAK_DEK_KEY")]
    pub dek_key: String,

    /// Transit key used for sign/verify
    #[arg(long, default_value = "app-sign", env = "CLOAK_SIGN_KEY")]
    pub sign_key: String,

    /// KV path of the secret holding `app_salt`
    #[arg(long, default_value = "secret/data/app", env = "CLOAK_SALT_PATH")]
    pub salt_path: String,

    /// Vault request timeout in seconds
    #[arg(long, default_value_t = 10, env = "CLOAK_VAULT_TIMEOUT_SECS")]
    pub vault_timeout_secs: u64,

    /// Accepted /verify attempts per client per window
    #[arg(long, default_value_t = 10, env = "CLOAK_VERIFY_LIMIT")]
    pub verify_limit: u32,

    /// Length of the /verify rate-limit window in seconds
    #[arg(long, default_value_t = 60, env = "CLOAK_VERIFY_WINDOW_SECS")]
    pub verify_window_secs: u64,

    /// Key the rate limiter on the first X-Forwarded-For address
    #[arg(long, env = "CLOAK_TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.vault_token.is_empty() {
            bail!("vault token must not be empty");
        }
        for (name, value) in [
            ("dek key", &self.dek_key),
            ("sign key", &self.sign_key),
            ("salt path", &self.salt_path),
        ] {
            if value.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }
        if self.vault_timeout_secs == 0 {
            bail!("vault timeout must be greater than zero");
        }
        if self.verify_limit == 0 {
            bail!("verify limit must be greater than zero");
        }
        if self.verify_window_secs == 0 {
            bail!("verify window must be greater than zero");
        }
        Ok(())
    }

    /// Vault request timeout.
    pub fn vault_timeout(&self) -> Duration {
        Duration::from_secs(self.vault_timeout_secs)
    }

    /// Key names and salt location for the crypto proxy.
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            dek_key: self.dek_key.clone(),
            sign_key: self.sign_key.clone(),
            salt_path: self.salt_path.clone(),
        }
    }

    /// Quota for the verification limiter.
    pub fn limiter_config(&self) -> FixedWindowConfig {
        FixedWindowConfig {
            limit: self.verify_limit,
            window: Duration::from_secs(self.verify_window_secs),
        }
    }
}
