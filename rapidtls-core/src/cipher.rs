//! Record protection state: per-direction keys, nonces, and sequence
//! counters.
//!
//! A [`Cipher`] is built once from handshake-supplied secrets and split
//! into a seal (encrypt) half and an open (decrypt) half. The two halves
//! share nothing but the negotiated suite: each owns its cipher instance
//! and its monotonically advancing sequence counter, so the directions can
//! live on different threads.
//!
//! # Nonce Construction (RFC 8446 Section 5.3)
//!
//! ```text
//! nonce = static_iv XOR pad_left(seq, iv_len)
//! ```
//!
//! The XOR covers the trailing 8 bytes of the static IV, which handles the
//! 12-byte GCM/ChaCha20 IVs and the 16-byte AEGIS-128L nonce alike. CBC
//! suites instead draw a fresh explicit IV per record from the provider
//! RNG.

use std::ops::Range;

use rapidtls_crypto::{Aead, Cbc, CryptoProvider, Hmac, Random};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::protocol::{ContentType, ProtocolVersion};
use crate::record::{RecordHeader, AEAD_TAG_LEN, MAX_PLAINTEXT_RECORD_LEN, RECORD_HEADER_LEN};
use crate::suite::CipherSuite;

/// Key material for one direction, as handed over by the handshake.
pub struct DirectionSecrets {
    /// Symmetric encryption key
    pub key: Zeroizing<Vec<u8>>,

    /// Static IV (AEAD suites); empty for CBC-HMAC suites
    pub iv: Zeroizing<Vec<u8>>,

    /// MAC key (CBC-HMAC suites); empty for AEAD suites
    pub mac_key: Zeroizing<Vec<u8>>,
}

impl DirectionSecrets {
    /// Wrap raw key material for an AEAD suite.
    pub fn aead(key: Vec<u8>, iv: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv: Zeroizing::new(iv),
            mac_key: Zeroizing::new(Vec::new()),
        }
    }

    /// Wrap raw key material for a CBC-HMAC suite.
    pub fn cbc(key: Vec<u8>, mac_key: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv: Zeroizing::new(Vec::new()),
            mac_key: Zeroizing::new(mac_key),
        }
    }

    fn validate(&self, suite: CipherSuite) -> Result<()> {
        if self.key.len() != suite.key_len() {
            return Err(Error::InvalidConfig(format!(
                "{} expects a {}-byte key, got {}",
                suite.name(),
                suite.key_len(),
                self.key.len()
            )));
        }
        if self.iv.len() != suite.fixed_iv_len() {
            return Err(Error::InvalidConfig(format!(
                "{} expects a {}-byte static IV, got {}",
                suite.name(),
                suite.fixed_iv_len(),
                self.iv.len()
            )));
        }
        if self.mac_key.len() != suite.mac_key_len() {
            return Err(Error::InvalidConfig(format!(
                "{} expects a {}-byte MAC key, got {}",
                suite.name(),
                suite.mac_key_len(),
                self.mac_key.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DirectionSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never reaches log output.
        f.debug_struct("DirectionSecrets")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .field("mac_key_len", &self.mac_key.len())
            .finish()
    }
}

/// Both directions of a freshly keyed epoch. Sequence counters start at
/// zero.
#[derive(Debug)]
pub struct SessionSecrets {
    /// Key material protecting records this endpoint sends
    pub send: DirectionSecrets,

    /// Key material protecting records this endpoint receives
    pub recv: DirectionSecrets,
}

/// The complete record-protection state for one connection.
#[derive(Debug)]
pub struct Cipher {
    seal: SealState,
    open: OpenState,
}

impl Cipher {
    /// Build record protection from handshake output.
    ///
    /// Cipher instances are bound to their keys here, once; no per-record
    /// provider lookups happen afterwards.
    pub fn new(
        provider: &dyn CryptoProvider,
        suite: CipherSuite,
        secrets: SessionSecrets,
    ) -> Result<Self> {
        Ok(Self {
            seal: SealState::new(provider, suite, &secrets.send)?,
            open: OpenState::new(provider, suite, &secrets.recv)?,
        })
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.seal.suite
    }

    /// The protocol version the suite belongs to.
    pub fn version(&self) -> ProtocolVersion {
        self.seal.version
    }

    /// Split into independently owned seal and open halves.
    pub fn split(self) -> (SealState, OpenState) {
        (self.seal, self.open)
    }

    /// The seal (encrypt) half.
    pub fn seal_mut(&mut self) -> &mut SealState {
        &mut self.seal
    }

    /// The open (decrypt) half.
    pub fn open_mut(&mut self) -> &mut OpenState {
        &mut self.open
    }

    /// Encrypt `cleartext` into `sink`; see [`SealState::encrypt`].
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        cleartext: &[u8],
        sink: &mut [u8],
    ) -> Result<usize> {
        self.seal.encrypt(content_type, cleartext, sink)
    }

    /// Decrypt one record payload in place; see [`OpenState::decrypt`].
    pub fn decrypt(
        &mut self,
        header: &RecordHeader,
        payload: &mut [u8],
    ) -> Result<(ContentType, Range<usize>)> {
        self.open.decrypt(header, payload)
    }
}

enum SealCrypto {
    Aead {
        aead: Box<dyn Aead>,
        iv: Zeroizing<Vec<u8>>,
    },
    Cbc {
        cbc: Box<dyn Cbc>,
        mac: Box<dyn Hmac>,
        rng: Box<dyn Random>,
    },
}

enum OpenCrypto {
    Aead {
        aead: Box<dyn Aead>,
        iv: Zeroizing<Vec<u8>>,
    },
    Cbc {
        cbc: Box<dyn Cbc>,
        mac: Box<dyn Hmac>,
    },
}

/// Encrypt-direction record protection.
pub struct SealState {
    suite: CipherSuite,
    version: ProtocolVersion,
    crypto: SealCrypto,
    seq: u64,
}

impl std::fmt::Debug for SealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealState")
            .field("suite", &self.suite)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl SealState {
    fn new(
        provider: &dyn CryptoProvider,
        suite: CipherSuite,
        secrets: &DirectionSecrets,
    ) -> Result<Self> {
        secrets.validate(suite)?;
        let crypto = match suite.aead_algorithm() {
            Some(algorithm) => SealCrypto::Aead {
                aead: provider.aead(algorithm, &secrets.key)?,
                iv: secrets.iv.clone(),
            },
            None => SealCrypto::Cbc {
                // Suites without an AEAD always carry both CBC and HMAC
                // parameters; validate() has already checked the lengths.
                cbc: provider.cbc(
                    suite.cbc_algorithm().ok_or_else(|| {
                        Error::InvalidConfig(format!("{} has no record cipher", suite.name()))
                    })?,
                    &secrets.key,
                )?,
                mac: provider.hmac(
                    suite.hmac_algorithm().ok_or_else(|| {
                        Error::InvalidConfig(format!("{} has no record MAC", suite.name()))
                    })?,
                    &secrets.mac_key,
                )?,
                rng: provider.random_owned(),
            },
        };
        Ok(Self {
            suite,
            version: suite.protocol_version(),
            crypto,
            seq: 0,
        })
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// The current sequence number (the one the next record will use).
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Force the sequence counter, for tests and resumption plumbing.
    pub fn set_sequence(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Install new key material and start a fresh keying epoch.
    ///
    /// Used when a KeyUpdate commits: the counter resets to zero because
    /// the nonce space belongs to the new keys.
    pub fn rekey(
        &mut self,
        provider: &dyn CryptoProvider,
        secrets: &DirectionSecrets,
    ) -> Result<()> {
        let fresh = SealState::new(provider, self.suite, secrets)?;
        self.crypto = fresh.crypto;
        self.seq = 0;
        Ok(())
    }

    /// Upper bound on the bytes [`encrypt`](Self::encrypt) may write for
    /// `cleartext_len` input bytes. Use it to size the sink.
    pub fn sealed_len_bound(&self, cleartext_len: usize) -> usize {
        let records = cleartext_len.div_ceil(MAX_PLAINTEXT_RECORD_LEN);
        cleartext_len + records * self.record_overhead_bound()
    }

    fn record_overhead_bound(&self) -> usize {
        match self.version {
            // header + inner content type + tag
            ProtocolVersion::Tls13 => RECORD_HEADER_LEN + 1 + AEAD_TAG_LEN,
            _ => {
                if self.suite.is_aead() {
                    RECORD_HEADER_LEN + AEAD_TAG_LEN
                } else {
                    // header + explicit IV + MAC + maximal padding
                    let block = self.suite.explicit_iv_len();
                    RECORD_HEADER_LEN + block + self.suite.mac_key_len() + block
                }
            },
        }
    }

    /// Encrypt `cleartext` into `sink` as a sequence of protected records.
    ///
    /// The input is fragmented at 16384 bytes; each fragment becomes one
    /// record written contiguously into `sink` behind the previous one.
    ///
    /// # Returns
    ///
    /// Total bytes written to `sink`.
    ///
    /// # Errors
    ///
    /// - `BufferTooSmall` if `sink` cannot hold every record
    /// - `SequenceOverflow` if a record would exhaust the nonce space
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        cleartext: &[u8],
        sink: &mut [u8],
    ) -> Result<usize> {
        let mut written = 0;
        for fragment in cleartext.chunks(MAX_PLAINTEXT_RECORD_LEN) {
            written += self.seal_record(content_type, fragment, &mut sink[written..])?;
        }
        Ok(written)
    }

    /// Protect a single fragment into `out`, returning the bytes written.
    fn seal_record(
        &mut self,
        content_type: ContentType,
        fragment: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        debug_assert!(fragment.len() <= MAX_PLAINTEXT_RECORD_LEN);
        if self.seq == u64::MAX {
            return Err(Error::SequenceOverflow);
        }

        let written = match &mut self.crypto {
            SealCrypto::Aead { aead, iv } => {
                if self.version == ProtocolVersion::Tls13 {
                    // TLSInnerPlaintext = fragment || real content type
                    let inner_len = fragment.len() + 1;
                    let cipher_len = inner_len + AEAD_TAG_LEN;
                    let total = RECORD_HEADER_LEN + cipher_len;
                    if out.len() < total {
                        return Err(Error::BufferTooSmall { needed: total });
                    }

                    let header =
                        RecordHeader::new(ContentType::ApplicationData, cipher_len as u16);
                    out[..RECORD_HEADER_LEN].copy_from_slice(&header.encode());

                    let body = &mut out[RECORD_HEADER_LEN..total];
                    body[..fragment.len()].copy_from_slice(fragment);
                    body[fragment.len()] = content_type.to_u8();

                    let nonce = record_nonce(iv, self.seq);
                    aead.seal_in_place(&nonce, &header.encode(), body, inner_len)?;
                    total
                } else {
                    let cipher_len = fragment.len() + AEAD_TAG_LEN;
                    let total = RECORD_HEADER_LEN + cipher_len;
                    if out.len() < total {
                        return Err(Error::BufferTooSmall { needed: total });
                    }

                    let header = RecordHeader::new(content_type, cipher_len as u16);
                    out[..RECORD_HEADER_LEN].copy_from_slice(&header.encode());

                    let body = &mut out[RECORD_HEADER_LEN..total];
                    body[..fragment.len()].copy_from_slice(fragment);

                    let aad = tls12_aad(self.seq, content_type, fragment.len());
                    let nonce = record_nonce(iv, self.seq);
                    aead.seal_in_place(&nonce, &aad, body, fragment.len())?;
                    total
                }
            },
            SealCrypto::Cbc { cbc, mac, rng } => {
                let block = cbc.block_size();
                let mac_len = mac.output_size();
                let content_len = fragment.len() + mac_len;
                // TLS block padding: pad_len bytes of value pad_len, plus
                // the pad_len byte itself.
                let pad_len = (block - (content_len + 1) % block) % block;
                let padded_len = content_len + pad_len + 1;
                let total = RECORD_HEADER_LEN + block + padded_len;
                if out.len() < total {
                    return Err(Error::BufferTooSmall { needed: total });
                }

                let header = RecordHeader::new(content_type, (block + padded_len) as u16);
                out[..RECORD_HEADER_LEN].copy_from_slice(&header.encode());

                let (iv, body) = out[RECORD_HEADER_LEN..total].split_at_mut(block);
                rng.fill(iv).map_err(Error::from)?;

                let tag = mac.compute(&[
                    &self.seq.to_be_bytes(),
                    &[content_type.to_u8()],
                    &self.version.to_u16().to_be_bytes(),
                    &(fragment.len() as u16).to_be_bytes(),
                    fragment,
                ]);
                body[..fragment.len()].copy_from_slice(fragment);
                body[fragment.len()..content_len].copy_from_slice(&tag);
                for slot in &mut body[content_len..] {
                    *slot = pad_len as u8;
                }

                cbc.encrypt_in_place(iv, body)?;
                total
            },
        };

        self.seq += 1;
        Ok(written)
    }
}

/// Decrypt-direction record protection.
pub struct OpenState {
    suite: CipherSuite,
    version: ProtocolVersion,
    crypto: OpenCrypto,
    seq: u64,
}

impl std::fmt::Debug for OpenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenState")
            .field("suite", &self.suite)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl OpenState {
    fn new(
        provider: &dyn CryptoProvider,
        suite: CipherSuite,
        secrets: &DirectionSecrets,
    ) -> Result<Self> {
        secrets.validate(suite)?;
        let crypto = match suite.aead_algorithm() {
            Some(algorithm) => OpenCrypto::Aead {
                aead: provider.aead(algorithm, &secrets.key)?,
                iv: secrets.iv.clone(),
            },
            None => OpenCrypto::Cbc {
                cbc: provider.cbc(
                    suite.cbc_algorithm().ok_or_else(|| {
                        Error::InvalidConfig(format!("{} has no record cipher", suite.name()))
                    })?,
                    &secrets.key,
                )?,
                mac: provider.hmac(
                    suite.hmac_algorithm().ok_or_else(|| {
                        Error::InvalidConfig(format!("{} has no record MAC", suite.name()))
                    })?,
                    &secrets.mac_key,
                )?,
            },
        };
        Ok(Self {
            suite,
            version: suite.protocol_version(),
            crypto,
            seq: 0,
        })
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// The current sequence number (the one the next record must carry).
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Force the sequence counter, for tests and resumption plumbing.
    pub fn set_sequence(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Install new key material and start a fresh keying epoch.
    pub fn rekey(
        &mut self,
        provider: &dyn CryptoProvider,
        secrets: &DirectionSecrets,
    ) -> Result<()> {
        let fresh = OpenState::new(provider, self.suite, secrets)?;
        self.crypto = fresh.crypto;
        self.seq = 0;
        Ok(())
    }

    /// Verify and decrypt one record payload in place.
    ///
    /// `payload` must hold exactly `header.length` bytes. On success the
    /// plaintext occupies `payload[range]` and the returned content type is
    /// the record's real one (the inner type for TLS 1.3).
    ///
    /// # Errors
    ///
    /// - `BadRecordMac` on tag or MAC verification failure (including
    ///   sequence misalignment, since the AAD covers the counter)
    /// - `Decode` on malformed framing
    /// - `SequenceOverflow` if the counter would wrap
    pub fn decrypt(
        &mut self,
        header: &RecordHeader,
        payload: &mut [u8],
    ) -> Result<(ContentType, Range<usize>)> {
        debug_assert_eq!(payload.len(), header.length as usize);
        if self.seq == u64::MAX {
            return Err(Error::SequenceOverflow);
        }

        let result = match &mut self.crypto {
            OpenCrypto::Aead { aead, iv } => {
                if self.version == ProtocolVersion::Tls13 {
                    if payload.len() < AEAD_TAG_LEN + 1 {
                        return Err(Error::Decode("protected record too short".into()));
                    }
                    let nonce = record_nonce(iv, self.seq);
                    let inner_len = aead.open_in_place(&nonce, &header.encode(), payload)?;

                    // TLSInnerPlaintext: content || content_type || zeros*
                    let mut content_type_pos = inner_len;
                    while content_type_pos > 0 && payload[content_type_pos - 1] == 0 {
                        content_type_pos -= 1;
                    }
                    if content_type_pos == 0 {
                        return Err(Error::Decode("record is all padding".into()));
                    }
                    let content_type = ContentType::from_u8(payload[content_type_pos - 1])
                        .ok_or_else(|| Error::Decode("invalid inner content type".into()))?;
                    (content_type, 0..content_type_pos - 1)
                } else {
                    if payload.len() < AEAD_TAG_LEN {
                        return Err(Error::Decode("protected record too short".into()));
                    }
                    let plaintext_len = payload.len() - AEAD_TAG_LEN;
                    let aad = tls12_aad(self.seq, header.content_type, plaintext_len);
                    let nonce = record_nonce(iv, self.seq);
                    aead.open_in_place(&nonce, &aad, payload)?;
                    (header.content_type, 0..plaintext_len)
                }
            },
            OpenCrypto::Cbc { cbc, mac } => {
                let block = cbc.block_size();
                let mac_len = mac.output_size();
                if payload.len() < block * 2 || (payload.len() - block) % block != 0 {
                    return Err(Error::Decode("CBC record not block-aligned".into()));
                }

                let (iv, body) = payload.split_at_mut(block);
                cbc.decrypt_in_place(iv, body)?;

                // Padding and MAC verdicts are combined so a padding error
                // is indistinguishable from a MAC error.
                let pad_len = body[body.len() - 1] as usize;
                if body.len() < pad_len + 1 + mac_len {
                    return Err(Error::BadRecordMac);
                }
                let mut ok = Choice::from(1u8);
                for &byte in &body[body.len() - 1 - pad_len..] {
                    ok &= byte.ct_eq(&(pad_len as u8));
                }

                let fragment_len = body.len() - pad_len - 1 - mac_len;
                let expected = mac.compute(&[
                    &self.seq.to_be_bytes(),
                    &[header.content_type.to_u8()],
                    &self.version.to_u16().to_be_bytes(),
                    &(fragment_len as u16).to_be_bytes(),
                    &body[..fragment_len],
                ]);
                ok &= expected.ct_eq(&body[fragment_len..fragment_len + mac_len]);
                if !bool::from(ok) {
                    return Err(Error::BadRecordMac);
                }
                (header.content_type, block..block + fragment_len)
            },
        };

        self.seq += 1;
        Ok(result)
    }
}

/// Per-record AEAD nonce: static IV XOR right-aligned sequence number.
fn record_nonce(iv: &[u8], seq: u64) -> Zeroizing<Vec<u8>> {
    let mut nonce = Zeroizing::new(iv.to_vec());
    let offset = nonce.len() - 8;
    for (i, byte) in seq.to_be_bytes().iter().enumerate() {
        nonce[offset + i] ^= byte;
    }
    nonce
}

/// TLS 1.2 AEAD additional data (RFC 5246 Section 6.2.3.3):
/// seq_num || type || version || length.
fn tls12_aad(seq: u64, content_type: ContentType, plaintext_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type.to_u8();
    aad[9..11].copy_from_slice(&ProtocolVersion::Tls12.to_u16().to_be_bytes());
    aad[11..13].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}
