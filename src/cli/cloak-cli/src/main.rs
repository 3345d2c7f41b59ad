//! Cloak CLI - Command line interface.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "cloak")]
#[command(about = "Cloak CLI - Encrypt, decrypt, sign and verify through a Cloak server")]
#[command(version)]
struct Cli {
    /// Cloak server address
    #[arg(long, default_value = "http://localhost:8080", env = "CLOAK_ADDR")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a text
    Encrypt {
        /// Text to encrypt
        text: String,
    },
    /// Decrypt a ciphertext
    Decrypt {
        /// Ciphertext returned by `encrypt`
        ciphertext: String,
    },
    /// Sign a text
    Sign {
        /// Text to sign
        text: String,
    },
    /// Verify a signature (exits non-zero when invalid)
    Verify {
        /// Signed text
        text: String,
        /// Signature returned by `sign`
        signature: String,
    },
    /// Check server status
    Status,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    text: &'a str,
    signature: &'a str,
}

#[derive(Debug, Deserialize)]
struct CiphertextResponse {
    ciphertext: String,
}

#[derive(Debug, Deserialize)]
struct PlaintextResponse {
    plaintext: String,
}

#[derive(Debug, Deserialize)]
struct SignatureResponse {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    retry_after: Option<u64>,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct CloakClient {
    client: Client,
    base_url: String,
}

impl CloakClient {
    fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        action: &str,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
                error: "Unknown error".into(),
                retry_after: None,
            });
            if status == StatusCode::TOO_MANY_REQUESTS {
                bail!(
                    "{} failed: {} (retry after {}s)",
                    action,
                    error.error,
                    error.retry_after.unwrap_or(1)
                );
            }
            bail!("{} failed: {}", action, error.error);
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            bail!("Server error: HTTP {}", resp.status());
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn encrypt(&self, text: &str) -> Result<CiphertextResponse> {
        self.post("/encrypt", &TextRequest { text }, "Encrypt")
            .await
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<PlaintextResponse> {
        self.post("/decrypt", &DecryptRequest { ciphertext }, "Decrypt")
            .await
    }

    async fn sign(&self, text: &str) -> Result<SignatureResponse> {
        self.post("/sign", &TextRequest { text }, "Sign").await
    }

    async fn verify(&self, text: &str, signature: &str) -> Result<VerifyResponse> {
        self.post("/verify", &VerifyRequest { text, signature }, "Verify")
            .await
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_status(client: &CloakClient) -> Result<ExitCode> {
    let health = client.health().await?;

    println!("Cloak server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);

    Ok(ExitCode::SUCCESS)
}

async fn cmd_verify(client: &CloakClient, text: &str, signature: &str) -> Result<ExitCode> {
    let result = client.verify(text, signature).await?;

    if result.valid {
        println!("Signature is valid");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Signature is NOT valid");
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let client = CloakClient::new(&cli.addr)?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Encrypt { text } => {
            println!("{}", client.encrypt(&text).await?.ciphertext);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Decrypt { ciphertext } => {
            println!("{}", client.decrypt(&ciphertext).await?.plaintext);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Sign { text } => {
            println!("{}", client.sign(&text).await?.signature);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Verify { text, signature } => cmd_verify(&client, &text, &signature).await,
    }
}
