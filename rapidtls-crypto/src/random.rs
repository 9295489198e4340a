//! Cryptographically Secure Random Number Generator (CSPRNG) interface.

use crate::Result;

/// Random number generator trait.
///
/// The record plane uses this for per-record explicit IVs on CBC-HMAC
/// suites; the (external) handshake uses it for everything else.
///
/// # Security Requirements
///
/// - MUST be cryptographically secure and seeded from OS entropy
/// - MUST be thread-safe (`Send + Sync`)
pub trait Random: Send + Sync {
    /// Fill a buffer with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `RandomGenerationFailed` if the OS entropy source fails.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;

    /// Generate a random byte vector of specified length.
    fn generate(&self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }
}
