//! System CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

use rapidtls_crypto::{Error, Random, Result};

/// Random number generator backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl Random for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|_| Error::RandomGenerationFailed)
    }
}
