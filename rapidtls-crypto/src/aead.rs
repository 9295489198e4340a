//! AEAD (Authenticated Encryption with Associated Data) cipher interface.

use crate::{Error, Result};

/// AEAD cipher algorithms used by the rapidtls record plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128-GCM (TLS 1.3 mandatory cipher)
    Aes128Gcm,
    /// AES-256-GCM
    Aes256Gcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
    /// AEGIS-128L (draft-irtf-cfrg-aegis-aead)
    Aegis128L,
}

impl AeadAlgorithm {
    /// Get the key size in bytes for this algorithm.
    pub const fn key_size(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm => 32,
            AeadAlgorithm::ChaCha20Poly1305 => 32,
            AeadAlgorithm::Aegis128L => 16,
        }
    }

    /// Get the nonce size in bytes for this algorithm.
    pub const fn nonce_size(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 12,
            AeadAlgorithm::Aes256Gcm => 12,
            AeadAlgorithm::ChaCha20Poly1305 => 12,
            AeadAlgorithm::Aegis128L => 16,
        }
    }

    /// Get the authentication tag size in bytes for this algorithm.
    ///
    /// Every algorithm here carries a 16-byte tag; the record plane relies
    /// on that when sizing ciphertext expansion.
    pub const fn tag_size(self) -> usize {
        16
    }

    /// Get the name of this algorithm as used in TLS.
    pub const fn name(self) -> &'static str {
        match self {
            AeadAlgorithm::Aes128Gcm => "AES_128_GCM",
            AeadAlgorithm::Aes256Gcm => "AES_256_GCM",
            AeadAlgorithm::ChaCha20Poly1305 => "CHACHA20_POLY1305",
            AeadAlgorithm::Aegis128L => "AEGIS_128L",
        }
    }

    /// Whether the backing primitive is documented to accept input and
    /// output referring to the same buffer.
    ///
    /// The zero-copy engine refuses in-place operation for algorithms that
    /// do not guarantee this. All four algorithms here do.
    pub const fn supports_aliased_buffers(self) -> bool {
        true
    }
}

/// AEAD cipher trait, keyed at construction.
///
/// The in-place entry points are the primary interface: the record plane
/// encrypts into pre-sized pooled buffers and decrypts ciphertext where it
/// landed. The allocating variants are derived conveniences for tests and
/// cold paths.
///
/// # Security Requirements
///
/// - Tag verification MUST be constant-time
/// - Nonces MUST NOT be reused with the same key (the record plane
///   guarantees this through its sequence counters)
/// - `seal_in_place`/`open_in_place` MUST be correct when the plaintext and
///   ciphertext occupy the same memory (same-buffer aliasing)
pub trait Aead: Send + Sync {
    /// Encrypt and authenticate `buf[..plaintext_len]` in place, appending
    /// the tag at `buf[plaintext_len..plaintext_len + tag_size]`.
    ///
    /// # Returns
    ///
    /// Total bytes written: `plaintext_len + tag_size()`.
    ///
    /// # Errors
    ///
    /// - `InvalidNonceSize` if `nonce` does not match the algorithm
    /// - `BufferTooSmall` if `buf` cannot hold plaintext plus tag
    fn seal_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        plaintext_len: usize,
    ) -> Result<usize>;

    /// Verify and decrypt `buf` (ciphertext with trailing tag) in place.
    ///
    /// # Returns
    ///
    /// The plaintext length: `buf.len() - tag_size()`. The plaintext
    /// occupies `buf[..returned]`.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` if the tag does not verify (constant-time)
    /// - `InvalidLength` if `buf` is shorter than one tag
    fn open_in_place(&self, nonce: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<usize>;

    /// Encrypt and authenticate, returning ciphertext with appended tag.
    fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; plaintext.len() + self.tag_size()];
        buf[..plaintext.len()].copy_from_slice(plaintext);
        let written = self.seal_in_place(nonce, aad, &mut buf, plaintext.len())?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Verify and decrypt, returning the plaintext.
    fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < self.tag_size() {
            return Err(Error::InvalidLength);
        }
        let mut buf = ciphertext.to_vec();
        let plaintext_len = self.open_in_place(nonce, aad, &mut buf)?;
        buf.truncate(plaintext_len);
        Ok(buf)
    }

    /// Get the algorithm this cipher implements.
    fn algorithm(&self) -> AeadAlgorithm;

    /// Get the nonce size in bytes.
    fn nonce_size(&self) -> usize {
        self.algorithm().nonce_size()
    }

    /// Get the authentication tag size in bytes.
    fn tag_size(&self) -> usize {
        self.algorithm().tag_size()
    }
}
