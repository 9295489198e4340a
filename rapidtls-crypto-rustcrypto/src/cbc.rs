//! CBC block cipher implementations for the legacy TLS 1.2 suites.
//!
//! The `cbc` crate's encryptor/decryptor objects are single-use, so the key
//! stays pinned here and a fresh mode state is built per record. TLS block
//! padding is the record plane's responsibility; this layer only runs the
//! raw CBC transform over block-aligned buffers.

use aes::{Aes128, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use rapidtls_crypto::{Cbc, CbcAlgorithm, Error, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Create a CBC cipher instance with `key` bound to it.
pub fn create_cbc(algorithm: CbcAlgorithm, key: &[u8]) -> Result<Box<dyn Cbc>> {
    if key.len() != algorithm.key_size() {
        return Err(Error::InvalidKeySize {
            expected: algorithm.key_size(),
            actual: key.len(),
        });
    }
    Ok(Box::new(AesCbcImpl {
        key: Zeroizing::new(key.to_vec()),
        algorithm,
    }))
}

struct AesCbcImpl {
    key: Zeroizing<Vec<u8>>,
    algorithm: CbcAlgorithm,
}

impl AesCbcImpl {
    fn check(&self, iv: &[u8], buf: &[u8]) -> Result<()> {
        let block = self.algorithm.block_size();
        if iv.len() != block {
            return Err(Error::InvalidNonceSize {
                expected: block,
                actual: iv.len(),
            });
        }
        if buf.is_empty() || buf.len() % block != 0 {
            return Err(Error::InvalidLength);
        }
        Ok(())
    }
}

impl Cbc for AesCbcImpl {
    fn encrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<()> {
        self.check(iv, buf)?;
        let len = buf.len();
        match self.algorithm {
            CbcAlgorithm::Aes128 => Aes128CbcEnc::new_from_slices(&self.key, iv)
                .map_err(|_| Error::Internal("CBC state init failed".to_string()))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(|_| Error::InvalidLength),
            CbcAlgorithm::Aes256 => Aes256CbcEnc::new_from_slices(&self.key, iv)
                .map_err(|_| Error::Internal("CBC state init failed".to_string()))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(|_| Error::InvalidLength),
        }
    }

    fn decrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<()> {
        self.check(iv, buf)?;
        match self.algorithm {
            CbcAlgorithm::Aes128 => Aes128CbcDec::new_from_slices(&self.key, iv)
                .map_err(|_| Error::Internal("CBC state init failed".to_string()))?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|_| Error::InvalidLength),
            CbcAlgorithm::Aes256 => Aes256CbcDec::new_from_slices(&self.key, iv)
                .map_err(|_| Error::Internal("CBC state init failed".to_string()))?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|_| Error::InvalidLength),
        }
    }

    fn algorithm(&self) -> CbcAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbc_roundtrip() {
        let cipher = create_cbc(CbcAlgorithm::Aes128, &[3u8; 16]).unwrap();
        let iv = [5u8; 16];
        let original = *b"exactly 32 bytes of paddedinput!";

        let mut buf = original;
        cipher.encrypt_in_place(&iv, &mut buf).unwrap();
        assert_ne!(buf, original);

        cipher.decrypt_in_place(&iv, &mut buf).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn test_rejects_unaligned_input() {
        let cipher = create_cbc(CbcAlgorithm::Aes256, &[3u8; 32]).unwrap();
        let mut buf = [0u8; 17];
        assert_eq!(
            cipher.encrypt_in_place(&[0u8; 16], &mut buf),
            Err(Error::InvalidLength)
        );
    }
}
