//! TLS protocol constants and wire types.

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ProtocolVersion {
    /// TLS 1.0 (RFC 2246) - accepted only as a legacy record version
    Tls10 = 0x0301,

    /// TLS 1.2 (RFC 5246)
    Tls12 = 0x0303,

    /// TLS 1.3 (RFC 8446)
    Tls13 = 0x0304,
}

impl ProtocolVersion {
    /// Create from wire format (u16 big-endian).
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0301 => Some(ProtocolVersion::Tls10),
            0x0303 => Some(ProtocolVersion::Tls12),
            0x0304 => Some(ProtocolVersion::Tls13),
            _ => None,
        }
    }

    /// Convert to wire format (u16 big-endian).
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Get the protocol name.
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVersion::Tls10 => "TLS 1.0",
            ProtocolVersion::Tls12 => "TLS 1.2",
            ProtocolVersion::Tls13 => "TLS 1.3",
        }
    }

    /// Whether a record header may carry this value in its legacy-version
    /// field. TLS 1.3 records always claim 0x0303; 0x0301 appears on
    /// first-flight plaintext from some stacks.
    pub const fn is_valid_legacy_version(value: u16) -> bool {
        matches!(value, 0x0301 | 0x0303)
    }
}

/// TLS content type (RFC 8446 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// Change cipher spec (20) - legacy, tolerated for middlebox compat
    ChangeCipherSpec = 20,

    /// Alert (21)
    Alert = 21,

    /// Handshake (22)
    Handshake = 22,

    /// Application data (23)
    ApplicationData = 23,
}

impl ContentType {
    /// Create from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// TLS 1.3 handshake message types the data plane must recognize on its
/// cold path. Everything else is opaque and forwarded to the handshake
/// subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    /// NewSessionTicket (4)
    NewSessionTicket = 4,

    /// KeyUpdate (24)
    KeyUpdate = 24,
}

impl HandshakeType {
    /// Create from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(HandshakeType::NewSessionTicket),
            24 => Some(HandshakeType::KeyUpdate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version() {
        assert_eq!(
            ProtocolVersion::from_u16(0x0304),
            Some(ProtocolVersion::Tls13)
        );
        assert_eq!(ProtocolVersion::Tls13.to_u16(), 0x0304);
        assert_eq!(ProtocolVersion::Tls12.name(), "TLS 1.2");
        assert!(ProtocolVersion::is_valid_legacy_version(0x0301));
        assert!(ProtocolVersion::is_valid_legacy_version(0x0303));
        assert!(!ProtocolVersion::is_valid_legacy_version(0x0304));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(ContentType::from_u8(23), Some(ContentType::ApplicationData));
        assert_eq!(ContentType::ApplicationData.to_u8(), 23);
        assert_eq!(ContentType::from_u8(26), None);
    }

    #[test]
    fn test_handshake_type() {
        assert_eq!(HandshakeType::from_u8(24), Some(HandshakeType::KeyUpdate));
        assert_eq!(HandshakeType::from_u8(1), None);
    }
}
