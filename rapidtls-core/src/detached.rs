//! Caller-driven record protection.
//!
//! [`DetachedConnection`] is the non-blocking face of the data plane: it
//! never touches a transport. The caller feeds it wire bytes and drains
//! ciphertext itself, which is the natural shape for reactors that own
//! their sockets and buffers.

use std::ops::Range;

use crate::cipher::{Cipher, OpenState, SealState};
use crate::error::{Error, Result};
use crate::protocol::ContentType;
use crate::record::{RecordHeader, MAX_PLAINTEXT_RECORD_LEN, RECORD_HEADER_LEN};
use crate::zerocopy::ZeroCopyEngine;
use crate::suite::CipherSuite;

/// Result of [`DetachedConnection::encrypt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptOutcome {
    /// Ciphertext bytes written to the output buffer
    pub written: usize,

    /// Cleartext bytes consumed from the input
    pub consumed: usize,
}

/// Result of [`DetachedConnection::decrypt`] for one complete record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    /// Where the plaintext landed in the output buffer
    pub plaintext: Range<usize>,

    /// Wire bytes consumed from the input (header plus payload)
    pub consumed: usize,

    /// The record's real content type
    pub content_type: ContentType,
}

/// Record protection with caller-owned I/O.
///
/// Unlike [`Connection`](crate::conn::Connection) this type makes no
/// policy decisions: alerts, handshake messages, and change-cipher-spec
/// records are surfaced to the caller with their content type.
#[derive(Debug)]
pub struct DetachedConnection {
    seal: SealState,
    open: OpenState,
    engine: ZeroCopyEngine,
    failed: bool,
}

impl DetachedConnection {
    /// Wrap a freshly keyed cipher.
    pub fn new(cipher: Cipher) -> Self {
        let (seal, open) = cipher.split();
        Self {
            seal,
            open,
            engine: ZeroCopyEngine::new(),
            failed: false,
        }
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.seal.suite()
    }

    /// Snapshot of the zero-copy engine counters.
    pub fn zero_copy_stats(&self) -> crate::zerocopy::ZeroCopySnapshot {
        self.engine.stats()
    }

    /// Mutable access to the seal half, for rekeying.
    pub fn seal_mut(&mut self) -> &mut SealState {
        &mut self.seal
    }

    /// Mutable access to the open half, for rekeying.
    pub fn open_mut(&mut self) -> &mut OpenState {
        &mut self.open
    }

    /// Whether a fatal error has retired this connection.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(Error::Unexpected("connection already failed".into()));
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        if err.is_fatal() {
            self.failed = true;
        }
        Err(err)
    }

    /// Protect as much of `input` as fits `output`.
    ///
    /// Whole fragments only: input is consumed in up-to-16384-byte chunks
    /// and a chunk is consumed only when its complete record fits the
    /// remaining output.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` when not even the first record fits `output`.
    pub fn encrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<EncryptOutcome> {
        self.check_usable()?;

        let mut consumed = 0;
        let mut written = 0;
        while consumed < input.len() {
            let fragment_len = (input.len() - consumed).min(MAX_PLAINTEXT_RECORD_LEN);
            let fragment = &input[consumed..consumed + fragment_len];
            let needed = self.seal.sealed_len_bound(fragment_len);
            if output.len() - written < needed {
                if written == 0 {
                    return Err(Error::BufferTooSmall { needed });
                }
                break;
            }
            match self.seal.encrypt(
                ContentType::ApplicationData,
                fragment,
                &mut output[written..],
            ) {
                Ok(n) => written += n,
                Err(err) => return self.fail(err),
            }
            consumed += fragment_len;
        }

        Ok(EncryptOutcome { written, consumed })
    }

    /// Unprotect the first complete record in `input`, decrypting inside
    /// `output`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when `input` does not yet hold a complete record; feed
    /// more bytes and call again. Nothing is consumed in that case.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if `output` cannot hold the record payload, plus
    /// the usual record-plane failures (`Decode`, `BadRecordMac`, ...).
    pub fn decrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<Option<DecryptOutcome>> {
        self.check_usable()?;

        if input.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }
        let mut header_bytes = [0u8; RECORD_HEADER_LEN];
        header_bytes.copy_from_slice(&input[..RECORD_HEADER_LEN]);
        let header = match RecordHeader::decode(&header_bytes) {
            Ok(header) => header,
            Err(err) => return self.fail(err),
        };

        let payload_len = header.length as usize;
        let total = RECORD_HEADER_LEN + payload_len;
        if input.len() < total {
            return Ok(None);
        }
        if output.len() < payload_len {
            return Err(Error::BufferTooSmall {
                needed: payload_len,
            });
        }

        // The caller's output buffer doubles as the AEAD working space, so
        // an aligned buffer gets the in-place path.
        output[..payload_len].copy_from_slice(&input[RECORD_HEADER_LEN..total]);
        let decrypted = match self
            .engine
            .decrypt_in_place(&mut self.open, &header, &mut output[..payload_len])
        {
            Ok(decrypted) => decrypted,
            Err(err) => return self.fail(err),
        };

        Ok(Some(DecryptOutcome {
            plaintext: decrypted.plaintext,
            consumed: total,
            content_type: decrypted.content_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{DirectionSecrets, SessionSecrets};
    use rapidtls_crypto::CryptoProvider;
    use rapidtls_crypto_rustcrypto::RustCryptoProvider;

    fn paired() -> (DetachedConnection, DetachedConnection) {
        let provider = RustCryptoProvider::new();
        let (k1, iv1) = (vec![1u8; 16], vec![2u8; 12]);
        let (k2, iv2) = (vec![3u8; 16], vec![4u8; 12]);

        let client = Cipher::new(
            &provider,
            CipherSuite::Aes128GcmSha256,
            SessionSecrets {
                send: DirectionSecrets::aead(k1.clone(), iv1.clone()),
                recv: DirectionSecrets::aead(k2.clone(), iv2.clone()),
            },
        )
        .unwrap();
        let server = Cipher::new(
            &provider,
            CipherSuite::Aes128GcmSha256,
            SessionSecrets {
                send: DirectionSecrets::aead(k2, iv2),
                recv: DirectionSecrets::aead(k1, iv1),
            },
        )
        .unwrap();
        (DetachedConnection::new(client), DetachedConnection::new(server))
    }

    #[test]
    fn test_detached_roundtrip() {
        let (mut client, mut server) = paired();

        let mut wire = vec![0u8; 4096];
        let outcome = client.encrypt(b"detached hello", &mut wire).unwrap();
        assert_eq!(outcome.consumed, 14);

        let mut plain = vec![0u8; 4096];
        let decrypted = server
            .decrypt(&wire[..outcome.written], &mut plain)
            .unwrap()
            .unwrap();
        assert_eq!(decrypted.consumed, outcome.written);
        assert_eq!(decrypted.content_type, ContentType::ApplicationData);
        assert_eq!(&plain[decrypted.plaintext], b"detached hello");
    }

    #[test]
    fn test_partial_input_consumes_nothing() {
        let (mut client, mut server) = paired();

        let mut wire = vec![0u8; 4096];
        let outcome = client.encrypt(b"partial", &mut wire).unwrap();

        let mut plain = vec![0u8; 4096];
        // Header only
        assert_eq!(server.decrypt(&wire[..3], &mut plain).unwrap(), None);
        // Header plus half the payload
        assert_eq!(
            server
                .decrypt(&wire[..outcome.written - 4], &mut plain)
                .unwrap(),
            None
        );
        // Sequence state untouched: the full record still decrypts.
        let decrypted = server
            .decrypt(&wire[..outcome.written], &mut plain)
            .unwrap()
            .unwrap();
        assert_eq!(&plain[decrypted.plaintext], b"partial");
    }

    #[test]
    fn test_output_too_small_for_one_record() {
        let (mut client, _) = paired();
        let mut wire = [0u8; 8];
        assert!(matches!(
            client.encrypt(b"does not fit", &mut wire),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_tampered_record_fails_connection() {
        let (mut client, mut server) = paired();

        let mut wire = vec![0u8; 4096];
        let outcome = client.encrypt(b"x", &mut wire).unwrap();
        wire[outcome.written - 1] ^= 0x80;

        let mut plain = vec![0u8; 4096];
        assert_eq!(
            server.decrypt(&wire[..outcome.written], &mut plain),
            Err(Error::BadRecordMac)
        );
        assert!(server.is_failed());
        assert!(server.decrypt(&wire[..outcome.written], &mut plain).is_err());
    }
}
