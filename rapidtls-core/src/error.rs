//! Error types for the rapidtls data plane.

use core::fmt;

use crate::alert::AlertDescription;

/// Result type for rapidtls operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors observable on the connection data plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration
    InvalidConfig(String),

    /// Malformed record or frame. Fatal.
    Decode(String),

    /// AEAD tag verification failed, or the record sequence is misaligned.
    /// Fatal; the peer is told `bad_record_mac`.
    BadRecordMac,

    /// Record larger than the protocol allows. Fatal.
    RecordOverflow,

    /// Content type or state the data plane cannot accept. Fatal.
    Unexpected(String),

    /// Peer-initiated graceful close. Surfaces as EOF.
    CloseNotify,

    /// Caller-supplied output cannot hold the result. Retry with more space.
    BufferTooSmall {
        /// Bytes the operation would have needed
        needed: usize,
    },

    /// A sequence counter would wrap. Fatal (RFC 8446 Section 5.5).
    SequenceOverflow,

    /// In-place alias or alignment preconditions violated. The caller may
    /// fall back to the copy path.
    InvalidBuffer(&'static str),

    /// Fatal alert received from the peer.
    AlertReceived(AlertDescription),

    /// Cryptographic backend failure other than tag verification.
    Crypto(String),

    /// Underlying transport error.
    Io {
        /// The `std::io` error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },
}

impl Error {
    /// Whether this error must fail the connection.
    ///
    /// Recoverable errors leave the data plane in its previous state; fatal
    /// ones transition it to `Failed` and emit an alert where one applies.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::CloseNotify
                | Error::BufferTooSmall { .. }
                | Error::InvalidBuffer(_)
                | Error::InvalidConfig(_)
        )
    }

    /// The alert to send the peer for this error, if any.
    pub fn to_alert(&self) -> Option<AlertDescription> {
        match self {
            Error::Decode(_) => Some(AlertDescription::DecodeError),
            Error::BadRecordMac => Some(AlertDescription::BadRecordMac),
            Error::RecordOverflow => Some(AlertDescription::RecordOverflow),
            Error::Unexpected(_) => Some(AlertDescription::UnexpectedMessage),
            Error::SequenceOverflow | Error::Crypto(_) => Some(AlertDescription::InternalError),
            Error::CloseNotify => Some(AlertDescription::CloseNotify),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Decode(msg) => write!(f, "Malformed record: {}", msg),
            Error::BadRecordMac => write!(f, "Bad record MAC"),
            Error::RecordOverflow => write!(f, "Record overflow"),
            Error::Unexpected(msg) => write!(f, "Unexpected message: {}", msg),
            Error::CloseNotify => write!(f, "Connection closed by peer"),
            Error::BufferTooSmall { needed } => {
                write!(f, "Output buffer too small: {} bytes needed", needed)
            },
            Error::SequenceOverflow => write!(f, "Record sequence number overflow"),
            Error::InvalidBuffer(msg) => write!(f, "Invalid buffer for in-place operation: {}", msg),
            Error::AlertReceived(desc) => write!(f, "Alert received: {:?}", desc),
            Error::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::Io { kind, message } => write!(f, "I/O error ({:?}): {}", kind, message),
        }
    }
}

impl std::error::Error for Error {}

impl From<rapidtls_crypto::Error> for Error {
    fn from(e: rapidtls_crypto::Error) -> Self {
        match e {
            rapidtls_crypto::Error::AuthenticationFailed => Error::BadRecordMac,
            rapidtls_crypto::Error::BufferTooSmall => Error::BufferTooSmall { needed: 0 },
            other => Error::Crypto(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io { kind, message } => std::io::Error::new(kind, message),
            Error::CloseNotify => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e.to_string())
            },
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(Error::BadRecordMac.is_fatal());
        assert!(Error::SequenceOverflow.is_fatal());
        assert!(Error::Decode("short header".into()).is_fatal());
        assert!(!Error::CloseNotify.is_fatal());
        assert!(!Error::BufferTooSmall { needed: 64 }.is_fatal());
        assert!(!Error::InvalidBuffer("unaligned").is_fatal());
    }

    #[test]
    fn test_alert_mapping() {
        assert_eq!(
            Error::BadRecordMac.to_alert(),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(
            Error::RecordOverflow.to_alert(),
            Some(AlertDescription::RecordOverflow)
        );
        assert_eq!(Error::BufferTooSmall { needed: 1 }.to_alert(), None);
    }

    #[test]
    fn test_crypto_error_conversion() {
        let e: Error = rapidtls_crypto::Error::AuthenticationFailed.into();
        assert_eq!(e, Error::BadRecordMac);
    }
}
