//! # rapidtls Cryptographic Provider Interface
//!
//! This crate defines the cryptographic abstraction layer for the rapidtls
//! record plane. It provides trait-based interfaces that allow pluggable
//! cryptographic backends without the record layer knowing which library
//! performs the work.
//!
//! ## Design Goals
//!
//! 1. **Pluggable:** Support multiple crypto libraries behind one interface
//! 2. **Zero-allocation:** The primary seal/open entry points operate in
//!    place on caller-owned buffers; allocating conveniences are derived
//! 3. **Bind keys once:** Cipher instances are keyed at construction so
//!    per-record calls never re-run a key schedule
//! 4. **Constant-time:** Tag and MAC verification must be constant-time
//!
//! ## Architecture
//!
//! ```text
//! CryptoProvider (main trait)
//! ├── Aead (record AEAD: AES-GCM, ChaCha20-Poly1305, AEGIS-128L)
//! ├── Cbc  (CBC block cipher for legacy TLS 1.2 CBC-HMAC suites)
//! ├── Hmac (record MAC for CBC-HMAC suites)
//! └── Random (CSPRNG, explicit IV generation)
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod aead;
pub mod cbc;
pub mod error;
pub mod hmac;
pub mod random;

pub use aead::{Aead, AeadAlgorithm};
pub use cbc::{Cbc, CbcAlgorithm};
pub use error::{Error, Result};
pub use hmac::{Hmac, HmacAlgorithm};
pub use random::Random;

/// The main cryptographic provider trait.
///
/// Implementations hand out cipher instances with the key material bound at
/// construction time. The record plane holds on to those instances for the
/// lifetime of a keying epoch, so a provider is consulted once per key
/// installation, never per record.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the cipher instances they
/// return are moved into per-direction record state and may live on
/// different threads.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Create a new instance of the crypto provider.
    fn new() -> Self
    where
        Self: Sized;

    /// Create an AEAD cipher instance with `key` bound to it.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm` if the backend cannot do `algorithm`
    /// - `InvalidKeySize` if `key` does not match the algorithm
    fn aead(&self, algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>>;

    /// Create a CBC block cipher instance with `key` bound to it.
    fn cbc(&self, algorithm: CbcAlgorithm, key: &[u8]) -> Result<Box<dyn Cbc>>;

    /// Create a keyed HMAC instance.
    fn hmac(&self, algorithm: HmacAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>>;

    /// Get the random number generator.
    fn random(&self) -> &dyn Random;

    /// Get an owned handle to the random number generator, for cipher
    /// states that outlive the provider borrow (CBC explicit IVs).
    fn random_owned(&self) -> Box<dyn Random>;

    /// Check if the provider supports a specific AEAD algorithm.
    fn supports_aead(&self, algorithm: AeadAlgorithm) -> bool {
        let probe_key = vec![0u8; algorithm.key_size()];
        self.aead(algorithm, &probe_key).is_ok()
    }
}
