//! In-memory transit backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use cloak_vault::{BackendError, TransitBackend};

const PREFIX: &str = "mem:v1:";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Unavailable,
    Rejected,
    Server,
}

impl Failure {
    fn into_error(self) -> BackendError {
        match self {
            Failure::Unavailable => BackendError::Unavailable("connection refused".into()),
            Failure::Rejected => BackendError::Rejected {
                status: 400,
                message: "injected".into(),
            },
            Failure::Server => BackendError::Server {
                status: 500,
                message: "injected".into(),
            },
        }
    }
}

/// Deterministic stand-in for the vault: ciphertexts index a local table and
/// signatures are SHA-256 digests of key and input.
#[derive(Default)]
pub(crate) struct MemoryTransit {
    secrets: Mutex<HashMap<String, String>>,
    ciphertexts: Mutex<Vec<Vec<u8>>>,
    last_encrypted: Mutex<Option<Vec<u8>>>,
    last_signed: Mutex<Option<Vec<u8>>>,
    failure: Mutex<Option<Failure>>,
    fetches: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryTransit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_salt(path: &str, salt: &str) -> Self {
        let backend = Self::new();
        backend
            .secrets
            .lock()
            .unwrap()
            .insert(path.to_string(), salt.to_string());
        backend
    }

    pub(crate) fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    pub(crate) fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of transit calls (everything except salt fetches).
    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_encrypted(&self) -> Option<Vec<u8>> {
        self.last_encrypted.lock().unwrap().clone()
    }

    pub(crate) fn last_signed(&self) -> Option<Vec<u8>> {
        self.last_signed.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), BackendError> {
        match *self.failure.lock().unwrap() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn digest(key: &str, input: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(b":");
        hasher.update(input);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn rejected(message: &str) -> BackendError {
        BackendError::Rejected {
            status: 400,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl TransitBackend for MemoryTransit {
    async fn fetch_secret(&self, path: &str) -> Result<Option<String>, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.secrets.lock().unwrap().get(path).cloned())
    }

    async fn encrypt(&self, _key: &str, plaintext: &[u8]) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        *self.last_encrypted.lock().unwrap() = Some(plaintext.to_vec());
        let mut table = self.ciphertexts.lock().unwrap();
        table.push(plaintext.to_vec());
        Ok(format!("{PREFIX}{}", table.len() - 1))
    }

    async fn decrypt(&self, _key: &str, ciphertext: &str) -> Result<Vec<u8>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let index: usize = ciphertext
            .strip_prefix(PREFIX)
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| Self::rejected("invalid ciphertext"))?;
        self.ciphertexts
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| Self::rejected("unknown ciphertext"))
    }

    async fn sign(&self, key: &str, input: &[u8]) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        *self.last_signed.lock().unwrap() = Some(input.to_vec());
        Ok(format!("{PREFIX}{}", Self::digest(key, input)))
    }

    async fn verify(
        &self,
        key: &str,
        input: &[u8],
        signature: &str,
    ) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let digest = signature
            .strip_prefix(PREFIX)
            .ok_or_else(|| Self::rejected("invalid signature version"))?;
        Ok(digest == Self::digest(key, input))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
