//! # RustCrypto-based Cryptography Provider for rapidtls
//!
//! This crate implements the [`rapidtls_crypto`] provider interface on top
//! of the RustCrypto project crates plus the reference AEGIS
//! implementation:
//!
//! - **AEAD**: AES-128-GCM, AES-256-GCM ([`aes_gcm`]), ChaCha20-Poly1305
//!   ([`chacha20poly1305`]), AEGIS-128L ([`aegis`])
//! - **CBC**: AES-128-CBC, AES-256-CBC ([`aes`] + [`cbc`]) for legacy
//!   TLS 1.2 CBC-HMAC suites
//! - **HMAC**: HMAC-SHA-256/384 ([`hmac`] + [`sha2`])
//! - **RNG**: the operating system CSPRNG via [`rand::rngs::OsRng`]
//!
//! All AEAD implementations here operate through the detached in-place
//! entry points of their backing crates, which are documented to transform
//! the message buffer in place. That property is what allows the record
//! plane's zero-copy engine to decrypt ciphertext where it landed.
//!
//! ## Example
//!
//! ```rust
//! use rapidtls_crypto::{AeadAlgorithm, CryptoProvider};
//! use rapidtls_crypto_rustcrypto::RustCryptoProvider;
//!
//! let provider = RustCryptoProvider::new();
//! let aead = provider.aead(AeadAlgorithm::Aes128Gcm, &[0u8; 16]).unwrap();
//! let sealed = aead.seal(&[0u8; 12], b"aad", b"message").unwrap();
//! assert_eq!(sealed.len(), b"message".len() + 16);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

use rapidtls_crypto::{
    Aead, AeadAlgorithm, Cbc, CbcAlgorithm, CryptoProvider, Hmac, HmacAlgorithm, Random, Result,
};

pub mod aead;
pub mod cbc;
pub mod hmac;
pub mod random;

use random::OsRandom;

/// Crypto provider backed by the RustCrypto crates.
#[derive(Debug, Default)]
pub struct RustCryptoProvider {
    random: OsRandom,
}

impl CryptoProvider for RustCryptoProvider {
    fn new() -> Self {
        Self::default()
    }

    fn aead(&self, algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>> {
        aead::create_aead(algorithm, key)
    }

    fn cbc(&self, algorithm: CbcAlgorithm, key: &[u8]) -> Result<Box<dyn Cbc>> {
        cbc::create_cbc(algorithm, key)
    }

    fn hmac(&self, algorithm: HmacAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
        hmac::create_hmac(algorithm, key)
    }

    fn random(&self) -> &dyn Random {
        &self.random
    }

    fn random_owned(&self) -> Box<dyn Random> {
        Box::new(self.random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_supports_all_record_aeads() {
        let provider = RustCryptoProvider::new();
        for algorithm in [
            AeadAlgorithm::Aes128Gcm,
            AeadAlgorithm::Aes256Gcm,
            AeadAlgorithm::ChaCha20Poly1305,
            AeadAlgorithm::Aegis128L,
        ] {
            assert!(provider.supports_aead(algorithm), "{:?}", algorithm);
        }
    }

    #[test]
    fn test_rejects_wrong_key_size() {
        let provider = RustCryptoProvider::new();
        assert!(provider.aead(AeadAlgorithm::Aes256Gcm, &[0u8; 16]).is_err());
        assert!(provider.cbc(CbcAlgorithm::Aes128, &[0u8; 8]).is_err());
    }
}
