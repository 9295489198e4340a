//! Cipher suite definitions and their record-layer properties.

use rapidtls_crypto::{AeadAlgorithm, CbcAlgorithm, HmacAlgorithm};

use crate::protocol::ProtocolVersion;

/// Cipher suites supported by the record plane.
///
/// TLS 1.3 suites name only the AEAD and hash; TLS 1.2 suites carry the
/// full negotiation but only their record-protection half matters here;
/// key exchange and authentication belong to the (external) handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CipherSuite {
    // TLS 1.3 cipher suites (0x13xx)
    /// TLS_AES_128_GCM_SHA256 (mandatory to implement)
    Aes128GcmSha256 = 0x1301,

    /// TLS_AES_256_GCM_SHA384
    Aes256GcmSha384 = 0x1302,

    /// TLS_CHACHA20_POLY1305_SHA256
    ChaCha20Poly1305Sha256 = 0x1303,

    /// TLS_AEGIS_128L_SHA256 (draft-irtf-cfrg-aegis-aead)
    Aegis128LSha256 = 0x1307,

    // TLS 1.2 cipher suites
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    EcdheRsaWithAes128GcmSha256 = 0xC02F,

    /// TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    EcdheRsaWithAes256GcmSha384 = 0xC030,

    /// TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
    EcdheRsaWithChaCha20Poly1305Sha256 = 0xCCA8,

    /// TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256 (legacy CBC-HMAC)
    EcdheRsaWithAes128CbcSha256 = 0xC027,
}

impl CipherSuite {
    /// Create from wire format (u16).
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1301 => Some(CipherSuite::Aes128GcmSha256),
            0x1302 => Some(CipherSuite::Aes256GcmSha384),
            0x1303 => Some(CipherSuite::ChaCha20Poly1305Sha256),
            0x1307 => Some(CipherSuite::Aegis128LSha256),
            0xC02F => Some(CipherSuite::EcdheRsaWithAes128GcmSha256),
            0xC030 => Some(CipherSuite::EcdheRsaWithAes256GcmSha384),
            0xCCA8 => Some(CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256),
            0xC027 => Some(CipherSuite::EcdheRsaWithAes128CbcSha256),
            _ => None,
        }
    }

    /// Convert to wire format (u16).
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// The AEAD algorithm protecting records, if this is an AEAD suite.
    pub const fn aead_algorithm(self) -> Option<AeadAlgorithm> {
        match self {
            CipherSuite::Aes128GcmSha256 | CipherSuite::EcdheRsaWithAes128GcmSha256 => {
                Some(AeadAlgorithm::Aes128Gcm)
            },
            CipherSuite::Aes256GcmSha384 | CipherSuite::EcdheRsaWithAes256GcmSha384 => {
                Some(AeadAlgorithm::Aes256Gcm)
            },
            CipherSuite::ChaCha20Poly1305Sha256
            | CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256 => {
                Some(AeadAlgorithm::ChaCha20Poly1305)
            },
            CipherSuite::Aegis128LSha256 => Some(AeadAlgorithm::Aegis128L),
            CipherSuite::EcdheRsaWithAes128CbcSha256 => None,
        }
    }

    /// The CBC block cipher, if this is a CBC-HMAC suite.
    pub const fn cbc_algorithm(self) -> Option<CbcAlgorithm> {
        match self {
            CipherSuite::EcdheRsaWithAes128CbcSha256 => Some(CbcAlgorithm::Aes128),
            _ => None,
        }
    }

    /// The record MAC, if this is a CBC-HMAC suite.
    pub const fn hmac_algorithm(self) -> Option<HmacAlgorithm> {
        match self {
            CipherSuite::EcdheRsaWithAes128CbcSha256 => Some(HmacAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Whether records are AEAD-protected.
    pub const fn is_aead(self) -> bool {
        self.aead_algorithm().is_some()
    }

    /// Encryption key length in bytes, per direction.
    pub const fn key_len(self) -> usize {
        match self {
            CipherSuite::Aes128GcmSha256
            | CipherSuite::EcdheRsaWithAes128GcmSha256
            | CipherSuite::Aegis128LSha256
            | CipherSuite::EcdheRsaWithAes128CbcSha256 => 16,
            CipherSuite::Aes256GcmSha384
            | CipherSuite::EcdheRsaWithAes256GcmSha384
            | CipherSuite::ChaCha20Poly1305Sha256
            | CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256 => 32,
        }
    }

    /// Static IV length in bytes, per direction.
    ///
    /// AEAD suites derive every record nonce from this value and the
    /// sequence counter; CBC-HMAC suites have no static IV at all.
    pub const fn fixed_iv_len(self) -> usize {
        match self {
            CipherSuite::Aegis128LSha256 => 16,
            CipherSuite::EcdheRsaWithAes128CbcSha256 => 0,
            _ => 12,
        }
    }

    /// Explicit per-record IV carried on the wire.
    pub const fn explicit_iv_len(self) -> usize {
        match self {
            CipherSuite::EcdheRsaWithAes128CbcSha256 => 16,
            _ => 0,
        }
    }

    /// MAC key length in bytes, per direction (CBC-HMAC suites only).
    pub const fn mac_key_len(self) -> usize {
        match self {
            CipherSuite::EcdheRsaWithAes128CbcSha256 => 32,
            _ => 0,
        }
    }

    /// AEAD authentication tag length in bytes (0 for CBC-HMAC suites,
    /// whose integrity bytes are the trailing MAC instead).
    pub const fn tag_len(self) -> usize {
        if self.is_aead() {
            16
        } else {
            0
        }
    }

    /// Whether the zero-copy engine may decrypt records of this suite in
    /// place. Only the AEAD suites whose primitives are documented to
    /// accept aliased buffers qualify; CBC-HMAC is excluded because of its
    /// padding handling.
    pub const fn supports_in_place(self) -> bool {
        self.is_aead()
    }

    /// The protocol version this suite belongs to.
    pub const fn protocol_version(self) -> ProtocolVersion {
        match self {
            CipherSuite::Aes128GcmSha256
            | CipherSuite::Aes256GcmSha384
            | CipherSuite::ChaCha20Poly1305Sha256
            | CipherSuite::Aegis128LSha256 => ProtocolVersion::Tls13,
            _ => ProtocolVersion::Tls12,
        }
    }

    /// Get the cipher suite name.
    pub const fn name(self) -> &'static str {
        match self {
            CipherSuite::Aes128GcmSha256 => "TLS_AES_128_GCM_SHA256",
            CipherSuite::Aes256GcmSha384 => "TLS_AES_256_GCM_SHA384",
            CipherSuite::ChaCha20Poly1305Sha256 => "TLS_CHACHA20_POLY1305_SHA256",
            CipherSuite::Aegis128LSha256 => "TLS_AEGIS_128L_SHA256",
            CipherSuite::EcdheRsaWithAes128GcmSha256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::EcdheRsaWithAes256GcmSha384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256 => {
                "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"
            },
            CipherSuite::EcdheRsaWithAes128CbcSha256 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        }
    }
}

/// Default cipher suite preference order.
pub const DEFAULT_CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite::Aes128GcmSha256,
    CipherSuite::ChaCha20Poly1305Sha256,
    CipherSuite::Aes256GcmSha384,
    CipherSuite::Aegis128LSha256,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_suite_conversion() {
        assert_eq!(
            CipherSuite::from_u16(0x1301),
            Some(CipherSuite::Aes128GcmSha256)
        );
        assert_eq!(CipherSuite::Aegis128LSha256.to_u16(), 0x1307);
        assert_eq!(CipherSuite::from_u16(0x1305), None);
    }

    #[test]
    fn test_aead_suite_properties() {
        let suite = CipherSuite::Aes128GcmSha256;
        assert_eq!(suite.aead_algorithm(), Some(AeadAlgorithm::Aes128Gcm));
        assert_eq!(suite.key_len(), 16);
        assert_eq!(suite.fixed_iv_len(), 12);
        assert_eq!(suite.explicit_iv_len(), 0);
        assert_eq!(suite.tag_len(), 16);
        assert!(suite.supports_in_place());
        assert_eq!(suite.protocol_version(), ProtocolVersion::Tls13);
    }

    #[test]
    fn test_cbc_suite_properties() {
        let suite = CipherSuite::EcdheRsaWithAes128CbcSha256;
        assert_eq!(suite.aead_algorithm(), None);
        assert_eq!(suite.cbc_algorithm(), Some(CbcAlgorithm::Aes128));
        assert_eq!(suite.hmac_algorithm(), Some(HmacAlgorithm::Sha256));
        assert_eq!(suite.explicit_iv_len(), 16);
        assert_eq!(suite.mac_key_len(), 32);
        assert!(!suite.supports_in_place());
        assert_eq!(suite.protocol_version(), ProtocolVersion::Tls12);
    }

    #[test]
    fn test_aegis_nonce_width() {
        assert_eq!(CipherSuite::Aegis128LSha256.fixed_iv_len(), 16);
    }
}
