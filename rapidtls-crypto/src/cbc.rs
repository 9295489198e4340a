//! CBC block cipher interface for legacy TLS 1.2 CBC-HMAC suites.

use crate::Result;

/// CBC block cipher algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CbcAlgorithm {
    /// AES-128 in CBC mode
    Aes128,
    /// AES-256 in CBC mode
    Aes256,
}

impl CbcAlgorithm {
    /// Get the key size in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            CbcAlgorithm::Aes128 => 16,
            CbcAlgorithm::Aes256 => 32,
        }
    }

    /// Get the cipher block size in bytes.
    pub const fn block_size(self) -> usize {
        16
    }
}

/// CBC mode block cipher, keyed at construction.
///
/// The buffer length must be a multiple of the block size; the record plane
/// applies TLS block padding before encryption and validates it after
/// decryption. CBC suites are never eligible for the zero-copy in-place
/// path, but the cipher itself still transforms the buffer in place.
pub trait Cbc: Send + Sync {
    /// Encrypt `buf` in place with the given IV.
    ///
    /// # Errors
    ///
    /// `InvalidLength` if `buf` is not block-aligned, `InvalidNonceSize` if
    /// the IV length is wrong.
    fn encrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<()>;

    /// Decrypt `buf` in place with the given IV.
    ///
    /// Padding is NOT validated here; the caller must check TLS padding and
    /// the record MAC together to avoid a padding-oracle timing channel.
    fn decrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<()>;

    /// Get the algorithm this cipher implements.
    fn algorithm(&self) -> CbcAlgorithm;

    /// Get the cipher block size in bytes.
    fn block_size(&self) -> usize {
        self.algorithm().block_size()
    }
}
