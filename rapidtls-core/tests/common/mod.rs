//! Shared helpers for the integration suites.

// Each suite uses a different subset of these helpers.
#![allow(dead_code)]

use std::io::{self, Read, Write};

use rapidtls_core::cipher::{Cipher, DirectionSecrets, SessionSecrets};
use rapidtls_core::suite::CipherSuite;
use rapidtls_crypto::CryptoProvider;
use rapidtls_crypto_rustcrypto::RustCryptoProvider;

/// In-memory half-duplex transport: reads consume `incoming`, writes
/// append to `outgoing`.
pub struct MemoryStream {
    pub incoming: io::Cursor<Vec<u8>>,
    pub outgoing: Vec<u8>,
}

impl MemoryStream {
    pub fn empty() -> Self {
        Self::with_incoming(Vec::new())
    }

    pub fn with_incoming(incoming: Vec<u8>) -> Self {
        Self {
            incoming: io::Cursor::new(incoming),
            outgoing: Vec::new(),
        }
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.incoming.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn direction_secrets(suite: CipherSuite, key_byte: u8, iv_byte: u8) -> DirectionSecrets {
    if suite.is_aead() {
        DirectionSecrets::aead(
            vec![key_byte; suite.key_len()],
            vec![iv_byte; suite.fixed_iv_len()],
        )
    } else {
        DirectionSecrets::cbc(
            vec![key_byte; suite.key_len()],
            vec![iv_byte; suite.mac_key_len()],
        )
    }
}

/// A cipher pair sharing keys so one side's output decrypts on the other.
pub fn cipher_pair(suite: CipherSuite) -> (Cipher, Cipher) {
    let provider = RustCryptoProvider::new();

    let left = Cipher::new(
        &provider,
        suite,
        SessionSecrets {
            send: direction_secrets(suite, 0x01, 0x02),
            recv: direction_secrets(suite, 0x03, 0x04),
        },
    )
    .unwrap();
    let right = Cipher::new(
        &provider,
        suite,
        SessionSecrets {
            send: direction_secrets(suite, 0x03, 0x04),
            recv: direction_secrets(suite, 0x01, 0x02),
        },
    )
    .unwrap();
    (left, right)
}

/// The S1 fixture: AES-128-GCM with key 16x01 / iv 12x02 in both
/// directions.
pub fn s1_cipher_pair() -> (Cipher, Cipher) {
    let provider = RustCryptoProvider::new();
    let make = || {
        Cipher::new(
            &provider,
            CipherSuite::Aes128GcmSha256,
            SessionSecrets {
                send: DirectionSecrets::aead(vec![0x01; 16], vec![0x02; 12]),
                recv: DirectionSecrets::aead(vec![0x01; 16], vec![0x02; 12]),
            },
        )
        .unwrap()
    };
    (make(), make())
}
