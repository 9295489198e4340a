//! HMAC (Hash-based Message Authentication Code) interface.

/// Hash algorithms available for record MACs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacAlgorithm {
    /// HMAC-SHA-256
    Sha256,
    /// HMAC-SHA-384
    Sha384,
}

impl HmacAlgorithm {
    /// Get the MAC output size in bytes.
    pub const fn output_size(self) -> usize {
        match self {
            HmacAlgorithm::Sha256 => 32,
            HmacAlgorithm::Sha384 => 48,
        }
    }
}

/// Keyed HMAC trait.
///
/// Instances are keyed by the provider and reused across records; `compute`
/// runs one MAC over the concatenation of `parts` so callers can feed the
/// TLS MAC input (sequence number, header fields, fragment) without
/// assembling a contiguous copy.
pub trait Hmac: Send + Sync {
    /// Compute the MAC over the concatenation of `parts`.
    fn compute(&self, parts: &[&[u8]]) -> Vec<u8>;

    /// Verify a MAC tag in constant time.
    ///
    /// # Security
    ///
    /// Comparison MUST be constant-time; the default implementation uses a
    /// constant-time equality over the freshly computed tag.
    fn verify(&self, parts: &[&[u8]], tag: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        let computed = self.compute(parts);
        computed.ct_eq(tag).into()
    }

    /// Get the MAC output size in bytes.
    fn output_size(&self) -> usize {
        self.algorithm().output_size()
    }

    /// Get the hash algorithm used by this HMAC.
    fn algorithm(&self) -> HmacAlgorithm;
}
