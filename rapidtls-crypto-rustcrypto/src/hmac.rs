//! HMAC implementations over SHA-2.

use hmac::{Hmac as HmacState, Mac};
use sha2::{Sha256, Sha384};
use zeroize::Zeroizing;

use rapidtls_crypto::{Hmac, HmacAlgorithm, Result};

/// Create a keyed HMAC instance.
pub fn create_hmac(algorithm: HmacAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
    Ok(Box::new(HmacImpl {
        key: Zeroizing::new(key.to_vec()),
        algorithm,
    }))
}

struct HmacImpl {
    key: Zeroizing<Vec<u8>>,
    algorithm: HmacAlgorithm,
}

impl Hmac for HmacImpl {
    fn compute(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self.algorithm {
            HmacAlgorithm::Sha256 => {
                // HMAC accepts keys of any length.
                let mut mac = <HmacState<Sha256> as Mac>::new_from_slice(&self.key).unwrap();
                for part in parts {
                    mac.update(part);
                }
                mac.finalize().into_bytes().to_vec()
            },
            HmacAlgorithm::Sha384 => {
                let mut mac = <HmacState<Sha384> as Mac>::new_from_slice(&self.key).unwrap();
                for part in parts {
                    mac.update(part);
                }
                mac.finalize().into_bytes().to_vec()
            },
        }
    }

    fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }
}
