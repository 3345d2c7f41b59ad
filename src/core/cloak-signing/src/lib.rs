//! # Cloak Signing
//!
//! Crypto proxy operations on top of the vault's transit engine.
//!
//! ## Salting
//!
//! Text is signed and verified as `text ++ salt`, where the salt is a secret
//! read once from the vault's KV store when the service is built. A signature
//! is therefore only valid through a service holding the same salt; a raw
//! transit signature over the bare text never verifies here.
//!
//! Encryption and decryption are passed through unsalted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod salt;
pub mod service;

#[cfg(test)]
pub(crate) mod memory;

pub use error::{ProxyError, SaltError};
pub use salt::Salt;
pub use service::{CryptoProxy, ProxyConfig};
