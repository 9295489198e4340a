//! TLS record framing.
//!
//! ```text
//! struct {
//!     ContentType type;
//!     ProtocolVersion legacy_record_version; // 0x0303 on protected records
//!     uint16 length;
//!     opaque fragment[TLSCiphertext.length];
//! } TLSCiphertext;
//! ```

use std::io;

use crate::error::{Error, Result};
use crate::protocol::{ContentType, ProtocolVersion};

/// Maximum plaintext fragment size (RFC 8446 Section 5.1).
pub const MAX_PLAINTEXT_RECORD_LEN: usize = 16384;

/// Maximum protected record payload size (RFC 8446 Section 5.2).
pub const MAX_CIPHERTEXT_RECORD_LEN: usize = MAX_PLAINTEXT_RECORD_LEN + 256;

/// TLS record header size.
pub const RECORD_HEADER_LEN: usize = 5;

/// AEAD authentication tag length shared by all supported AEAD suites.
pub const AEAD_TAG_LEN: usize = 16;

/// A parsed 5-byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Outer content type
    pub content_type: ContentType,

    /// Legacy record version as it appeared on the wire
    pub legacy_version: u16,

    /// Payload length following the header
    pub length: u16,
}

impl RecordHeader {
    /// Create a header for an outgoing protected record.
    pub fn new(content_type: ContentType, length: u16) -> Self {
        Self {
            content_type,
            legacy_version: ProtocolVersion::Tls12.to_u16(),
            length,
        }
    }

    /// Encode to the 5-byte wire format.
    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let len = self.length.to_be_bytes();
        let ver = self.legacy_version.to_be_bytes();
        [self.content_type.to_u8(), ver[0], ver[1], len[0], len[1]]
    }

    /// Decode and validate a 5-byte header.
    ///
    /// # Errors
    ///
    /// - `Decode` for an unknown content type or legacy version
    /// - `RecordOverflow` when `length` exceeds the protocol maximum
    pub fn decode(data: &[u8; RECORD_HEADER_LEN]) -> Result<Self> {
        let content_type = ContentType::from_u8(data[0])
            .ok_or_else(|| Error::Decode(format!("invalid content type {}", data[0])))?;

        let legacy_version = u16::from_be_bytes([data[1], data[2]]);
        if !ProtocolVersion::is_valid_legacy_version(legacy_version) {
            return Err(Error::Decode(format!(
                "invalid legacy record version {:#06x}",
                legacy_version
            )));
        }

        let length = u16::from_be_bytes([data[3], data[4]]);
        if length as usize > MAX_CIPHERTEXT_RECORD_LEN {
            return Err(Error::RecordOverflow);
        }

        Ok(Self {
            content_type,
            legacy_version,
            length,
        })
    }
}

/// Read one framed record from `stream` into `scratch`.
///
/// Reads the 5-byte header, validates it, then reads exactly
/// `header.length` payload bytes into the front of `scratch`, retrying
/// short reads until the record is complete.
///
/// # Returns
///
/// `Ok(None)` on clean EOF (the stream ended before any header byte);
/// otherwise the validated header, with the payload in
/// `scratch[..header.length]`.
///
/// # Errors
///
/// - `Decode` if the stream ends inside a record
/// - `BufferTooSmall` if `scratch` cannot hold the payload
/// - header validation errors from [`RecordHeader::decode`]
pub fn read_record_from<R: io::Read>(
    stream: &mut R,
    scratch: &mut [u8],
) -> Result<Option<RecordHeader>> {
    let mut header_bytes = [0u8; RECORD_HEADER_LEN];

    // The first byte is read separately so a connection that ends between
    // records surfaces as clean EOF rather than a truncated record.
    loop {
        match stream.read(&mut header_bytes[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    read_full(stream, &mut header_bytes[1..])?;

    let header = RecordHeader::decode(&header_bytes)?;
    let payload_len = header.length as usize;
    if scratch.len() < payload_len {
        return Err(Error::BufferTooSmall {
            needed: payload_len,
        });
    }
    read_full(stream, &mut scratch[..payload_len])?;

    Ok(Some(header))
}

/// Fill `buf` completely, retrying short reads.
fn read_full<R: io::Read>(stream: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::Decode("stream ended inside a record".into()));
            },
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
