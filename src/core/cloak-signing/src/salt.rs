//! Application salt, fetched once from the vault.

use std::fmt;

use sha2::{Digest, Sha256};
use tracing::{error, info};
use zeroize::Zeroizing;

use cloak_vault::TransitBackend;

use crate::SaltError;

/// Application-wide secret appended to every signed or verified text.
///
/// Never empty. The bytes are wiped on drop and never printed; `Debug`
/// shows only the [fingerprint](Salt::fingerprint).
pub struct Salt(Zeroizing<Vec<u8>>);

impl Salt {
    /// Fetches the salt stored at `path`.
    ///
    /// A vault failure, an absent field and an empty value are all errors:
    /// there is no unsalted fallback.
    pub async fn load(backend: &dyn TransitBackend, path: &str) -> Result<Self, SaltError> {
        let value = backend.fetch_secret(path).await.map_err(|e| {
            error!(path, error = %e, "Failed to fetch application salt");
            SaltError::Fetch(e)
        })?;

        let value = Zeroizing::new(value.ok_or_else(|| SaltError::Missing(path.to_string()))?);
        let salt = Self::from_bytes(value.as_bytes()).map_err(|_| SaltError::Empty(path.to_string()))?;

        info!(
            path,
            backend = backend.name(),
            fingerprint = %salt.fingerprint(),
            "Application salt loaded"
        );
        Ok(salt)
    }

    /// Wraps raw salt bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaltError> {
        if bytes.is_empty() {
            return Err(SaltError::Empty("<inline>".to_string()));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    /// Returns the raw salt.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Builds the salted input `text ++ salt`.
    pub fn salted(&self, text: &str) -> Zeroizing<Vec<u8>> {
        let mut input = Zeroizing::new(Vec::with_capacity(text.len() + self.0.len()));
        input.extend_from_slice(text.as_bytes());
        input.extend_from_slice(&self.0);
        input
    }

    /// Hex of the first 8 bytes of SHA-256(salt).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_slice());
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Salt").field(&self.fingerprint()).finish()
    }
}
