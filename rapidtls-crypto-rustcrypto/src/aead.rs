//! AEAD cipher implementations.
//!
//! The GCM and ChaCha20-Poly1305 ciphers go through the `aead` crate's
//! detached in-place interface; AEGIS-128L uses the reference crate's
//! in-place calls. All of them transform the message buffer in place with
//! the tag handled separately, which is the aliasing guarantee the record
//! plane's zero-copy engine relies on.

use aes_gcm::aead::{AeadInPlace, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

use rapidtls_crypto::{Aead, AeadAlgorithm, Error, Result};

const TAG_LEN: usize = 16;

/// Create an AEAD cipher instance with `key` bound to it.
pub fn create_aead(algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>> {
    if key.len() != algorithm.key_size() {
        return Err(Error::InvalidKeySize {
            expected: algorithm.key_size(),
            actual: key.len(),
        });
    }
    match algorithm {
        AeadAlgorithm::Aes128Gcm => {
            let cipher = Aes128Gcm::new_from_slice(key)
                .map_err(|_| Error::Internal("AES-128-GCM key rejected".to_string()))?;
            Ok(Box::new(DetachedAead { cipher, algorithm }))
        },
        AeadAlgorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|_| Error::Internal("AES-256-GCM key rejected".to_string()))?;
            Ok(Box::new(DetachedAead { cipher, algorithm }))
        },
        AeadAlgorithm::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|_| Error::Internal("ChaCha20-Poly1305 key rejected".to_string()))?;
            Ok(Box::new(DetachedAead { cipher, algorithm }))
        },
        AeadAlgorithm::Aegis128L => {
            let mut key_bytes = Zeroizing::new([0u8; 16]);
            key_bytes.copy_from_slice(key);
            Ok(Box::new(Aegis128LAead { key: key_bytes }))
        },
    }
}

/// Shared implementation over the `aead` crate's detached in-place calls
/// (AES-GCM and ChaCha20-Poly1305).
struct DetachedAead<C> {
    cipher: C,
    algorithm: AeadAlgorithm,
}

impl<C> DetachedAead<C> {
    fn check_nonce(&self, nonce: &[u8]) -> Result<()> {
        if nonce.len() != self.algorithm.nonce_size() {
            return Err(Error::InvalidNonceSize {
                expected: self.algorithm.nonce_size(),
                actual: nonce.len(),
            });
        }
        Ok(())
    }
}

impl<C> Aead for DetachedAead<C>
where
    C: AeadInPlace + Send + Sync,
{
    fn seal_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        plaintext_len: usize,
    ) -> Result<usize> {
        self.check_nonce(nonce)?;
        if buf.len() < plaintext_len + TAG_LEN {
            return Err(Error::BufferTooSmall);
        }
        let tag = self
            .cipher
            .encrypt_in_place_detached(
                Nonce::<C>::from_slice(nonce),
                aad,
                &mut buf[..plaintext_len],
            )
            .map_err(|_| Error::Internal("AEAD seal failed".to_string()))?;
        buf[plaintext_len..plaintext_len + TAG_LEN].copy_from_slice(&tag);
        Ok(plaintext_len + TAG_LEN)
    }

    fn open_in_place(&self, nonce: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<usize> {
        self.check_nonce(nonce)?;
        if buf.len() < TAG_LEN {
            return Err(Error::InvalidLength);
        }
        let plaintext_len = buf.len() - TAG_LEN;
        let (message, tag_bytes) = buf.split_at_mut(plaintext_len);
        let tag = Tag::<C>::clone_from_slice(tag_bytes);
        self.cipher
            .decrypt_in_place_detached(Nonce::<C>::from_slice(nonce), aad, message, &tag)
            .map_err(|_| Error::AuthenticationFailed)?;
        Ok(plaintext_len)
    }

    fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }
}

/// AEGIS-128L via the reference implementation.
///
/// The cipher state is cheap to initialize, so a fresh state per record
/// is how the crate is meant to be driven; the key stays pinned here.
struct Aegis128LAead {
    key: Zeroizing<[u8; 16]>,
}

impl Aead for Aegis128LAead {
    fn seal_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        plaintext_len: usize,
    ) -> Result<usize> {
        let nonce: [u8; 16] = nonce.try_into().map_err(|_| Error::InvalidNonceSize {
            expected: 16,
            actual: nonce.len(),
        })?;
        if buf.len() < plaintext_len + TAG_LEN {
            return Err(Error::BufferTooSmall);
        }
        let state = aegis::aegis128l::Aegis128L::<TAG_LEN>::new(&self.key, &nonce);
        let tag = state.encrypt_in_place(&mut buf[..plaintext_len], aad);
        buf[plaintext_len..plaintext_len + TAG_LEN].copy_from_slice(&tag);
        Ok(plaintext_len + TAG_LEN)
    }

    fn open_in_place(&self, nonce: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<usize> {
        let nonce: [u8; 16] = nonce.try_into().map_err(|_| Error::InvalidNonceSize {
            expected: 16,
            actual: nonce.len(),
        })?;
        if buf.len() < TAG_LEN {
            return Err(Error::InvalidLength);
        }
        let plaintext_len = buf.len() - TAG_LEN;
        let (message, tag_bytes) = buf.split_at_mut(plaintext_len);
        let tag: [u8; TAG_LEN] = (&*tag_bytes)
            .try_into()
            .map_err(|_| Error::InvalidLength)?;
        let state = aegis::aegis128l::Aegis128L::<TAG_LEN>::new(&self.key, &nonce);
        state
            .decrypt_in_place(message, &tag, aad)
            .map_err(|_| Error::AuthenticationFailed)?;
        Ok(plaintext_len)
    }

    fn algorithm(&self) -> AeadAlgorithm {
        AeadAlgorithm::Aegis128L
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(algorithm: AeadAlgorithm) {
        let key = vec![0x42u8; algorithm.key_size()];
        let nonce = vec![0x24u8; algorithm.nonce_size()];
        let aead = create_aead(algorithm, &key).unwrap();

        let sealed = aead.seal(&nonce, b"header", b"payload").unwrap();
        assert_eq!(sealed.len(), b"payload".len() + TAG_LEN);
        assert_ne!(&sealed[..7], b"payload");

        let opened = aead.open(&nonce, b"header", &sealed).unwrap();
        assert_eq!(opened, b"payload");
    }

    #[test]
    fn test_roundtrip_all_algorithms() {
        roundtrip(AeadAlgorithm::Aes128Gcm);
        roundtrip(AeadAlgorithm::Aes256Gcm);
        roundtrip(AeadAlgorithm::ChaCha20Poly1305);
        roundtrip(AeadAlgorithm::Aegis128L);
    }

    #[test]
    fn test_in_place_matches_allocating_path() {
        let aead = create_aead(AeadAlgorithm::Aes128Gcm, &[7u8; 16]).unwrap();
        let nonce = [9u8; 12];

        let mut buf = vec![0u8; 5 + TAG_LEN];
        buf[..5].copy_from_slice(b"hello");
        let written = aead.seal_in_place(&nonce, b"ad", &mut buf, 5).unwrap();
        assert_eq!(written, 21);
        assert_eq!(buf, aead.seal(&nonce, b"ad", b"hello").unwrap());

        let plaintext_len = aead.open_in_place(&nonce, b"ad", &mut buf).unwrap();
        assert_eq!(&buf[..plaintext_len], b"hello");
    }

    #[test]
    fn test_tampered_tag_fails() {
        let aead = create_aead(AeadAlgorithm::ChaCha20Poly1305, &[1u8; 32]).unwrap();
        let nonce = [0u8; 12];
        let mut sealed = aead.seal(&nonce, b"", b"data").unwrap();
        *sealed.last_mut().unwrap() ^= 0x01;
        assert_eq!(
            aead.open(&nonce, b"", &sealed),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn test_wrong_aad_fails() {
        let aead = create_aead(AeadAlgorithm::Aegis128L, &[1u8; 16]).unwrap();
        let nonce = [0u8; 16];
        let sealed = aead.seal(&nonce, b"aad-one", b"data").unwrap();
        assert!(aead.open(&nonce, b"aad-two", &sealed).is_err());
    }

    #[test]
    fn test_wrong_nonce_size_rejected() {
        let aead = create_aead(AeadAlgorithm::Aes128Gcm, &[0u8; 16]).unwrap();
        let mut buf = [0u8; 32];
        assert!(matches!(
            aead.seal_in_place(&[0u8; 16], b"", &mut buf, 4),
            Err(Error::InvalidNonceSize { expected: 12, .. })
        ));
    }
}
