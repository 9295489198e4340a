//! Record plane integration: framing, fragmentation, sequence discipline.

mod common;

use rapidtls_core::cipher::DirectionSecrets;
use rapidtls_core::record::{
    read_record_from, RecordHeader, AEAD_TAG_LEN, MAX_PLAINTEXT_RECORD_LEN, RECORD_HEADER_LEN,
};
use rapidtls_core::suite::CipherSuite;
use rapidtls_core::{ContentType, Error};
use rapidtls_crypto::CryptoProvider;
use rapidtls_crypto_rustcrypto::RustCryptoProvider;

use common::{cipher_pair, s1_cipher_pair};

/// S1: the canonical AES-128-GCM round trip. Five plaintext bytes become
/// a 22-byte protected payload (5 + 1 inner type + 16 tag) behind a
/// 5-byte header announcing length 22.
#[test]
fn aes128_gcm_hello_record_layout() {
    let (mut sender, mut receiver) = s1_cipher_pair();

    let mut wire = [0u8; 64];
    let written = sender
        .encrypt(ContentType::ApplicationData, b"hello", &mut wire)
        .unwrap();
    assert_eq!(written, RECORD_HEADER_LEN + 22);
    assert_eq!(&wire[..3], &[0x17, 0x03, 0x03]);
    assert_eq!(u16::from_be_bytes([wire[3], wire[4]]), 22);

    let mut header_bytes = [0u8; RECORD_HEADER_LEN];
    header_bytes.copy_from_slice(&wire[..RECORD_HEADER_LEN]);
    let header = RecordHeader::decode(&header_bytes).unwrap();

    let payload = &mut wire[RECORD_HEADER_LEN..written];
    let (content_type, range) = receiver.decrypt(&header, payload).unwrap();
    assert_eq!(content_type, ContentType::ApplicationData);
    assert_eq!(&payload[range], b"hello");
}

/// Invariant 1: one record advances each counter by exactly one.
#[test]
fn counters_advance_one_per_record() {
    let (mut sender, mut receiver) = s1_cipher_pair();
    let (seal, open) = (sender.seal_mut(), receiver.open_mut());
    assert_eq!(seal.sequence(), 0);
    assert_eq!(open.sequence(), 0);

    let mut wire = [0u8; 128];
    for expected in 1..=3u64 {
        let n = seal.encrypt(ContentType::ApplicationData, b"tick", &mut wire).unwrap();
        assert_eq!(seal.sequence(), expected);

        let mut header_bytes = [0u8; RECORD_HEADER_LEN];
        header_bytes.copy_from_slice(&wire[..RECORD_HEADER_LEN]);
        let header = RecordHeader::decode(&header_bytes).unwrap();
        open.decrypt(&header, &mut wire[RECORD_HEADER_LEN..n]).unwrap();
        assert_eq!(open.sequence(), expected);
    }
}

/// S2: a 20,000-byte write splits into exactly two records carrying
/// 16384 and 3616 cleartext bytes.
#[test]
fn twenty_kilobytes_splits_into_two_records() {
    let (mut sender, _) = s1_cipher_pair();
    let cleartext = vec![0xabu8; 20_000];

    let mut wire = vec![0u8; sender.seal_mut().sealed_len_bound(cleartext.len())];
    let written = sender
        .encrypt(ContentType::ApplicationData, &cleartext, &mut wire)
        .unwrap();

    // First record
    let first_len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
    assert_eq!(first_len, MAX_PLAINTEXT_RECORD_LEN + 1 + AEAD_TAG_LEN);

    // Second record directly behind it
    let second_at = RECORD_HEADER_LEN + first_len;
    let second_len =
        u16::from_be_bytes([wire[second_at + 3], wire[second_at + 4]]) as usize;
    assert_eq!(second_len, 3616 + 1 + AEAD_TAG_LEN);

    assert_eq!(written, second_at + RECORD_HEADER_LEN + second_len);
}

/// Invariant 2: decrypting split records in order reassembles the
/// original stream.
#[test]
fn split_records_concatenate() {
    let (mut sender, mut receiver) = s1_cipher_pair();
    let cleartext: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

    let mut wire = vec![0u8; sender.seal_mut().sealed_len_bound(cleartext.len())];
    let written = sender
        .encrypt(ContentType::ApplicationData, &cleartext, &mut wire)
        .unwrap();

    let mut reassembled = Vec::new();
    let mut stream: &[u8] = &wire[..written];
    let mut scratch = vec![0u8; 17 * 1024];
    while let Some(header) = read_record_from(&mut stream, &mut scratch).unwrap() {
        let payload = &mut scratch[..header.length as usize];
        let (content_type, range) = receiver.decrypt(&header, payload).unwrap();
        assert_eq!(content_type, ContentType::ApplicationData);
        reassembled.extend_from_slice(&payload[range]);
    }
    assert_eq!(reassembled, cleartext);
}

/// Record protection round-trips on every supported suite, including the
/// TLS 1.2 AEAD and CBC-HMAC representatives.
#[test]
fn all_suites_roundtrip() {
    for suite in [
        CipherSuite::Aes128GcmSha256,
        CipherSuite::Aes256GcmSha384,
        CipherSuite::ChaCha20Poly1305Sha256,
        CipherSuite::Aegis128LSha256,
        CipherSuite::EcdheRsaWithAes128GcmSha256,
        CipherSuite::EcdheRsaWithAes256GcmSha384,
        CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256,
        CipherSuite::EcdheRsaWithAes128CbcSha256,
    ] {
        let (mut sender, mut receiver) = cipher_pair(suite);
        for message in [&b""[..], b"x", b"record plane", &[0u8; 4096]] {
            let mut wire = vec![0u8; sender.seal_mut().sealed_len_bound(message.len().max(1))];
            let written = sender
                .encrypt(ContentType::ApplicationData, message, &mut wire)
                .unwrap();
            if message.is_empty() {
                assert_eq!(written, 0, "{:?}", suite);
                continue;
            }

            let mut header_bytes = [0u8; RECORD_HEADER_LEN];
            header_bytes.copy_from_slice(&wire[..RECORD_HEADER_LEN]);
            let header = RecordHeader::decode(&header_bytes).unwrap();
            let payload = &mut wire[RECORD_HEADER_LEN..written];
            let (content_type, range) = receiver.decrypt(&header, payload).unwrap();
            assert_eq!(content_type, ContentType::ApplicationData, "{:?}", suite);
            assert_eq!(&payload[range], message, "{:?}", suite);
        }
    }
}

/// TLS 1.2 keeps the real content type on the outer header.
#[test]
fn tls12_outer_content_type_is_real() {
    let (mut sender, _) = cipher_pair(CipherSuite::EcdheRsaWithAes128GcmSha256);
    let mut wire = [0u8; 128];
    sender.encrypt(ContentType::Alert, &[1, 0], &mut wire).unwrap();
    assert_eq!(wire[0], 21);
}

/// Reordered records fail verification: the AAD binds the counter.
#[test]
fn reordered_record_is_bad_mac() {
    let (mut sender, mut receiver) = s1_cipher_pair();

    let mut first = [0u8; 64];
    let n1 = sender.encrypt(ContentType::ApplicationData, b"one", &mut first).unwrap();
    let mut second = [0u8; 64];
    let n2 = sender.encrypt(ContentType::ApplicationData, b"two", &mut second).unwrap();

    // Deliver the second record first.
    let mut header_bytes = [0u8; RECORD_HEADER_LEN];
    header_bytes.copy_from_slice(&second[..RECORD_HEADER_LEN]);
    let header = RecordHeader::decode(&header_bytes).unwrap();
    assert_eq!(
        receiver.decrypt(&header, &mut second[RECORD_HEADER_LEN..n2]),
        Err(Error::BadRecordMac)
    );
    let _ = (n1, first);
}

/// Property 8: a counter at 2^64 - 1 refuses to protect another record.
#[test]
fn sequence_overflow_is_fatal() {
    let (mut sender, mut receiver) = s1_cipher_pair();

    sender.seal_mut().set_sequence(u64::MAX);
    let mut wire = [0u8; 64];
    assert_eq!(
        sender.encrypt(ContentType::ApplicationData, b"overflow", &mut wire),
        Err(Error::SequenceOverflow)
    );

    receiver.open_mut().set_sequence(u64::MAX);
    let header = RecordHeader::new(ContentType::ApplicationData, 22);
    let mut payload = [0u8; 22];
    assert_eq!(
        receiver.decrypt(&header, &mut payload),
        Err(Error::SequenceOverflow)
    );
}

/// A sink that cannot hold the record is reported, not truncated.
#[test]
fn undersized_sink_is_buffer_too_small() {
    let (mut sender, _) = s1_cipher_pair();
    let mut wire = [0u8; 16];
    assert!(matches!(
        sender.encrypt(ContentType::ApplicationData, b"hello", &mut wire),
        Err(Error::BufferTooSmall { needed: 27 })
    ));
}

/// Rekeying installs fresh keys and restarts that direction's epoch.
#[test]
fn rekey_resets_one_direction() {
    let provider = RustCryptoProvider::new();
    let (mut sender, mut receiver) = s1_cipher_pair();

    let mut wire = [0u8; 64];
    let n = sender.encrypt(ContentType::ApplicationData, b"before", &mut wire).unwrap();
    let mut header_bytes = [0u8; RECORD_HEADER_LEN];
    header_bytes.copy_from_slice(&wire[..RECORD_HEADER_LEN]);
    let header = RecordHeader::decode(&header_bytes).unwrap();
    receiver.decrypt(&header, &mut wire[RECORD_HEADER_LEN..n]).unwrap();
    assert_eq!(sender.seal_mut().sequence(), 1);

    let fresh = || DirectionSecrets::aead(vec![0x10; 16], vec![0x20; 12]);
    sender.seal_mut().rekey(&provider, &fresh()).unwrap();
    receiver.open_mut().rekey(&provider, &fresh()).unwrap();
    assert_eq!(sender.seal_mut().sequence(), 0);
    assert_eq!(receiver.open_mut().sequence(), 0);

    let n = sender.encrypt(ContentType::ApplicationData, b"after", &mut wire).unwrap();
    header_bytes.copy_from_slice(&wire[..RECORD_HEADER_LEN]);
    let header = RecordHeader::decode(&header_bytes).unwrap();
    let payload = &mut wire[RECORD_HEADER_LEN..n];
    let (_, range) = receiver.decrypt(&header, payload).unwrap();
    assert_eq!(&payload[range], b"after");
}

/// Wrong-version secrets are rejected up front.
#[test]
fn mismatched_secret_lengths_rejected() {
    use rapidtls_core::cipher::{Cipher, SessionSecrets};
    let provider = RustCryptoProvider::new();
    let result = Cipher::new(
        &provider,
        CipherSuite::Aes128GcmSha256,
        SessionSecrets {
            send: DirectionSecrets::aead(vec![0u8; 32], vec![0u8; 12]), // 32-byte key for AES-128
            recv: DirectionSecrets::aead(vec![0u8; 16], vec![0u8; 12]),
        },
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
