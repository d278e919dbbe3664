//! Record framing shared by segment writers and readers.
//!
//! ```text
//! | length (4) | type (1) | checksum (2) | payload (length) |
//! ```
//!
//! All integers are little-endian. The checksum is CRC-16/IBM-SDLC over the
//! payload only.
//!
//! A clean close appends [`CLOSING_MAGIC`], a header-sized marker with a zero
//! length and the reserved type byte `0xFF`. It is not a record: readers step
//! over it, and a writer reopening the segment appends after it.

use crate::error::{WalError, WalResult};
use crc::{Crc, CRC_16_IBM_SDLC};
use std::io::{self, Read};

/// Header size: length (4) + type (1) + checksum (2) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Fixed per-record overhead in bytes.
pub const RECORD_OVERHEAD: u64 = HEADER_SIZE as u64;

/// Marker written after the last record when a segment is closed cleanly.
pub const CLOSING_MAGIC: [u8; HEADER_SIZE] = [0, 0, 0, 0, 0xFF, 0xFF, 0xFF];

const CHECKSUM: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Type of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Opaque application payload.
    Data = 1,
    /// Checkpoint marker; the payload is the UTF-8 tag name.
    Tag = 2,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Data),
            2 => Some(Self::Tag),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A decoded, checksum-verified record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record type.
    pub record_type: RecordType,
    /// Stored (and verified) payload checksum.
    pub checksum: u16,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

/// One unit decoded from a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete record.
    Record(Record),
    /// The closing marker.
    Closed,
}

impl Frame {
    /// Number of bytes this frame occupies on disk.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        match self {
            Self::Record(record) => RECORD_OVERHEAD + record.payload.len() as u64,
            Self::Closed => RECORD_OVERHEAD,
        }
    }
}

/// Computes the checksum stored in a record header.
///
/// An empty payload checksums to 0, so a zero checksum does not mark a
/// record as missing or unset.
#[must_use]
pub fn checksum(payload: &[u8]) -> u16 {
    CHECKSUM.checksum(payload)
}

/// Frames a payload as a record.
///
/// # Errors
///
/// Returns [`WalError::PayloadTooLarge`] if the payload does not fit the
/// 4-byte length field.
pub fn encode(record_type: RecordType, payload: &[u8]) -> WalResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| WalError::PayloadTooLarge { len: payload.len() })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.push(record_type.as_byte());
    buf.extend_from_slice(&checksum(payload).to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes the frame at the current position of `src`.
///
/// `offset` is only used to label errors.
///
/// Returns `Ok(None)` if the header or payload is incomplete: the reader may
/// sit at the live write frontier, and the bytes may still arrive.
///
/// # Errors
///
/// Returns [`WalError::ChecksumMismatch`] if a complete record fails
/// verification, [`WalError::Corruption`] for an unknown type byte, and
/// [`WalError::Io`] for read failures.
pub fn read_frame<R: Read>(src: &mut R, offset: u64) -> WalResult<Option<Frame>> {
    let mut header = [0u8; HEADER_SIZE];
    if read_full(src, &mut header)? < HEADER_SIZE {
        return Ok(None);
    }

    if header == CLOSING_MAGIC {
        return Ok(Some(Frame::Closed));
    }

    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let type_byte = header[4];
    let stored = u16::from_le_bytes([header[5], header[6]]);

    let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
        WalError::corruption(offset, format!("unknown record type {type_byte}"))
    })?;

    // Read through `take` so a damaged length never drives a huge allocation.
    let mut payload = Vec::new();
    src.by_ref().take(u64::from(len)).read_to_end(&mut payload)?;
    if payload.len() < len as usize {
        return Ok(None);
    }

    let actual = checksum(&payload);
    if actual != stored {
        return Err(WalError::ChecksumMismatch {
            offset,
            expected: stored,
            actual,
        });
    }

    Ok(Some(Frame::Record(Record {
        record_type,
        checksum: stored,
        payload,
    })))
}

/// Reads until `buf` is full or the source is exhausted.
fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> WalResult<Option<Frame>> {
        read_frame(&mut Cursor::new(bytes), 0)
    }

    #[test]
    fn record_type_roundtrip() {
        for t in [RecordType::Data, RecordType::Tag] {
            assert_eq!(RecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(RecordType::from_byte(0xFF), None);
    }

    #[test]
    fn header_layout() {
        let bytes = encode(RecordType::Tag, b"commit").unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 6);
        assert_eq!(&bytes[0..4], &6u32.to_le_bytes());
        assert_eq!(bytes[4], RecordType::Tag.as_byte());
        assert_eq!(&bytes[5..7], &checksum(b"commit").to_le_bytes());
        assert_eq!(&bytes[7..], b"commit");
    }

    #[test]
    fn checksum_values() {
        assert_eq!(checksum(b"123456789"), 0x906E);
        assert_eq!(checksum(b""), 0);

        let bytes = encode(RecordType::Data, b"").unwrap();
        let Some(Frame::Record(record)) = decode(&bytes).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(record.checksum, 0);
        assert!(record.payload.is_empty());
    }

    #[test]
    fn decode_complete_record() {
        let bytes = encode(RecordType::Data, b"this is data").unwrap();
        let frame = decode(&bytes).unwrap().unwrap();

        let Frame::Record(record) = frame else {
            panic!("expected a record");
        };
        assert_eq!(record.record_type, RecordType::Data);
        assert_eq!(record.payload, b"this is data");
        assert_ne!(record.checksum, 0);
    }

    #[test]
    fn empty_payload() {
        let bytes = encode(RecordType::Data, b"").unwrap();
        let frame = decode(&bytes).unwrap().unwrap();
        assert_eq!(frame.encoded_len(), RECORD_OVERHEAD);
    }

    #[test]
    fn truncated_header_is_not_available() {
        let bytes = encode(RecordType::Data, b"payload").unwrap();
        assert!(decode(&bytes[..4]).unwrap().is_none());
        assert!(decode(&[]).unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_not_available() {
        let bytes = encode(RecordType::Data, b"payload").unwrap();
        assert!(decode(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn flipped_payload_bit_is_corruption() {
        let mut bytes = encode(RecordType::Data, b"payload").unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { offset: 0, .. }));
    }

    #[test]
    fn unknown_type_is_corruption() {
        let mut bytes = encode(RecordType::Data, b"payload").unwrap();
        bytes[4] = 9;

        assert!(matches!(
            decode(&bytes).unwrap_err(),
            WalError::Corruption { .. }
        ));
    }

    #[test]
    fn closing_magic_decodes_as_closed() {
        assert_eq!(decode(&CLOSING_MAGIC).unwrap(), Some(Frame::Closed));
        assert_eq!(Frame::Closed.encoded_len(), CLOSING_MAGIC.len() as u64);
    }

    #[test]
    fn checksum_known_value() {
        // CRC-16/IBM-SDLC check value
        assert_eq!(checksum(b"123456789"), 0x906E);
    }
}
