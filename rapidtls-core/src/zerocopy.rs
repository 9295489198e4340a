//! Zero-copy record decryption.
//!
//! Protected records land in a receive buffer; for the AEAD suites the
//! plaintext is at most a tag's worth shorter than the ciphertext, so the
//! AEAD can verify and decrypt directly where the bytes sit instead of
//! into a second buffer. This module decides when that is safe and keeps
//! score of how much copying was avoided.
//!
//! The decision is a pure predicate over raw addresses so it can be tested
//! exhaustively; the engine entry points feed it the addresses of the
//! buffers they were actually handed.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cipher::OpenState;
use crate::error::{Error, Result};
use crate::protocol::ContentType;
use crate::record::{RecordHeader, AEAD_TAG_LEN};
use crate::suite::CipherSuite;

/// Default pointer alignment required for in-place decryption.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Whether a record of `suite` may be decrypted in place given the
/// ciphertext and output addresses.
///
/// In-place operation is allowed only when:
///
/// 1. the suite is an approved 16-byte-tag AEAD (CBC-HMAC is excluded;
///    its padding handling needs the untouched ciphertext),
/// 2. the output does not precede the ciphertext, and leads it by at most
///    the tag size (the AEAD shrinks the payload by exactly one tag, so a
///    forward shift beyond that would cross unwritten bytes),
/// 3. both addresses satisfy `alignment` (pass 1 to disable the check).
pub fn can_decrypt_in_place(
    suite: CipherSuite,
    ciphertext_addr: usize,
    output_addr: usize,
    alignment: usize,
) -> bool {
    if !suite.supports_in_place() {
        return false;
    }
    if output_addr < ciphertext_addr {
        return false;
    }
    if output_addr - ciphertext_addr > AEAD_TAG_LEN {
        return false;
    }
    if alignment > 1
        && (ciphertext_addr % alignment != 0 || output_addr % alignment != 0)
    {
        return false;
    }
    true
}

/// Counters for the in-place/copy decision, updated with relaxed atomics.
///
/// Engines are per-connection, so there is a single producer; the atomics
/// exist so a monitoring thread can snapshot without coordination.
#[derive(Debug, Default)]
pub struct ZeroCopyStats {
    in_place_decrypts: AtomicU64,
    copy_decrypts: AtomicU64,
    total_bytes_saved: AtomicU64,
}

/// A point-in-time copy of [`ZeroCopyStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZeroCopySnapshot {
    /// Records decrypted without a plaintext copy
    pub in_place_decrypts: u64,

    /// Records that went through the copy path
    pub copy_decrypts: u64,

    /// Plaintext bytes that never had to be copied
    pub total_bytes_saved: u64,
}

impl ZeroCopyStats {
    fn snapshot(&self) -> ZeroCopySnapshot {
        ZeroCopySnapshot {
            in_place_decrypts: self.in_place_decrypts.load(Ordering::Relaxed),
            copy_decrypts: self.copy_decrypts.load(Ordering::Relaxed),
            total_bytes_saved: self.total_bytes_saved.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of a record decryption through the engine.
///
/// `plaintext` indexes into whichever buffer holds the plaintext: the
/// ciphertext buffer for the in-place entry points, the output buffer for
/// [`ZeroCopyEngine::decrypt_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedRecord {
    /// The record's real content type
    pub content_type: ContentType,

    /// Where the plaintext landed
    pub plaintext: Range<usize>,

    /// Whether the in-place path ran
    pub in_place: bool,
}

/// Per-connection zero-copy decryption engine.
pub struct ZeroCopyEngine {
    alignment: usize,
    stats: ZeroCopyStats,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for ZeroCopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeroCopyEngine")
            .field("alignment", &self.alignment)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Default for ZeroCopyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroCopyEngine {
    /// Create an engine with the default 16-byte alignment requirement.
    pub fn new() -> Self {
        Self::with_alignment(DEFAULT_ALIGNMENT)
    }

    /// Create an engine with a custom alignment requirement.
    ///
    /// # Panics
    ///
    /// If `alignment` is zero or not a power of two.
    pub fn with_alignment(alignment: usize) -> Self {
        assert!(
            alignment.is_power_of_two(),
            "alignment must be a power of two"
        );
        Self {
            alignment,
            stats: ZeroCopyStats::default(),
            scratch: Vec::new(),
        }
    }

    /// The configured alignment requirement.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Snapshot the engine counters.
    pub fn stats(&self) -> ZeroCopySnapshot {
        self.stats.snapshot()
    }

    /// Decrypt a record whose ciphertext and plaintext share `payload`.
    ///
    /// When the safety predicate holds, the AEAD transforms `payload` where
    /// it sits. Otherwise (CBC suite, misaligned buffer) the record takes
    /// the copy path through internal scratch and the plaintext is written
    /// back to the front of `payload`; the outcome then reports
    /// `in_place: false`.
    pub fn decrypt_in_place(
        &mut self,
        open: &mut OpenState,
        header: &RecordHeader,
        payload: &mut [u8],
    ) -> Result<DecryptedRecord> {
        let addr = payload.as_ptr() as usize;
        if can_decrypt_in_place(open.suite(), addr, addr, self.alignment) {
            let (content_type, plaintext) = open.decrypt(header, payload)?;
            self.stats.in_place_decrypts.fetch_add(1, Ordering::Relaxed);
            self.stats
                .total_bytes_saved
                .fetch_add(plaintext.len() as u64, Ordering::Relaxed);
            return Ok(DecryptedRecord {
                content_type,
                plaintext,
                in_place: true,
            });
        }

        self.scratch.resize(payload.len(), 0);
        self.scratch.copy_from_slice(payload);
        let (content_type, range) = open.decrypt(header, &mut self.scratch)?;
        let len = range.len();
        payload[..len].copy_from_slice(&self.scratch[range]);
        self.stats.copy_decrypts.fetch_add(1, Ordering::Relaxed);
        Ok(DecryptedRecord {
            content_type,
            plaintext: 0..len,
            in_place: false,
        })
    }

    /// Like [`decrypt_in_place`](Self::decrypt_in_place), but fails with
    /// `InvalidBuffer` instead of falling back when the caller asserted
    /// in-place operation and the preconditions do not hold.
    pub fn decrypt_in_place_strict(
        &mut self,
        open: &mut OpenState,
        header: &RecordHeader,
        payload: &mut [u8],
    ) -> Result<DecryptedRecord> {
        let addr = payload.as_ptr() as usize;
        if !can_decrypt_in_place(open.suite(), addr, addr, self.alignment) {
            if !open.suite().supports_in_place() {
                return Err(Error::InvalidBuffer("suite excluded from in-place"));
            }
            return Err(Error::InvalidBuffer("buffer alignment"));
        }
        self.decrypt_in_place(open, header, payload)
    }

    /// Decrypt a record from `ciphertext` into `output` (copy path).
    ///
    /// The two buffers are necessarily disjoint, so the in-place predicate
    /// can never approve this call; it always counts as a copy decrypt.
    /// `ciphertext` is consumed as AEAD working space.
    pub fn decrypt_to(
        &mut self,
        open: &mut OpenState,
        header: &RecordHeader,
        ciphertext: &mut [u8],
        output: &mut [u8],
    ) -> Result<DecryptedRecord> {
        let (content_type, range) = open.decrypt(header, ciphertext)?;
        let len = range.len();
        if output.len() < len {
            return Err(Error::BufferTooSmall { needed: len });
        }
        output[..len].copy_from_slice(&ciphertext[range]);
        self.stats.copy_decrypts.fetch_add(1, Ordering::Relaxed);
        Ok(DecryptedRecord {
            content_type,
            plaintext: 0..len,
            in_place: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: usize = 0x7000; // synthetic, 16-aligned base address

    #[test]
    fn test_predicate_approves_exact_aliasing() {
        assert!(can_decrypt_in_place(
            CipherSuite::Aes128GcmSha256,
            P,
            P,
            DEFAULT_ALIGNMENT
        ));
    }

    #[test]
    fn test_predicate_forward_window() {
        // Offsets within one tag are allowed, provided alignment holds.
        assert!(can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P + 16, 16));
        assert!(can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P + 8, 8));
        assert!(can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P + 16, 1));
        // One byte past the tag is not.
        assert!(!can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P + 17, 1));
    }

    #[test]
    fn test_predicate_rejects_backward_output() {
        assert!(!can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P - 1, 1));
        assert!(!can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P, P - 16, 1));
    }

    #[test]
    fn test_predicate_rejects_cbc() {
        assert!(!can_decrypt_in_place(
            CipherSuite::EcdheRsaWithAes128CbcSha256,
            P,
            P,
            1
        ));
    }

    #[test]
    fn test_predicate_enforces_alignment() {
        assert!(!can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P + 1, P + 1, 16));
        assert!(can_decrypt_in_place(CipherSuite::Aes128GcmSha256, P + 1, P + 1, 1));
    }

    #[test]
    fn test_predicate_covers_all_aead_suites() {
        for suite in [
            CipherSuite::Aes128GcmSha256,
            CipherSuite::Aes256GcmSha384,
            CipherSuite::ChaCha20Poly1305Sha256,
            CipherSuite::Aegis128LSha256,
            CipherSuite::EcdheRsaWithAes128GcmSha256,
        ] {
            assert!(can_decrypt_in_place(suite, P, P, 16), "{:?}", suite);
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_engine_rejects_non_power_of_two_alignment() {
        let _ = ZeroCopyEngine::with_alignment(12);
    }
}
