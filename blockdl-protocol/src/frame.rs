//! Binary frame format for blockdl streams.
//!
//! Frame layout (8 bytes header + payload):
//!
//! ```text
//! +--------------+----------------+
//! | sequence_key | payload_length |
//! |   4 bytes    |    4 bytes     |
//! +--------------+----------------+
//! | payload                       |
//! | payload_length bytes          |
//! +-------------------------------+
//! ```
//!
//! Both header fields are big-endian unsigned integers. There is no magic,
//! version, checksum or delimiter; a stream is a plain concatenation of
//! frames and record boundaries come from the declared length alone.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes (4+4 = 8).
pub const FRAME_HEADER_SIZE: usize = 8;

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Record identifier (e.g. block number).
    pub sequence_key: u32,
    /// Number of payload bytes following the header.
    pub payload_length: u32,
}

impl FrameHeader {
    /// Parses a header from the start of `buf`.
    ///
    /// Returns `None` if fewer than [`FRAME_HEADER_SIZE`] bytes are available.
    /// Parsing cannot fail otherwise: every 8-byte sequence is a valid header.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }

        let mut header = &buf[..FRAME_HEADER_SIZE];
        let sequence_key = header.get_u32();
        let payload_length = header.get_u32();

        Some(Self {
            sequence_key,
            payload_length,
        })
    }

    /// Total size of the frame this header describes.
    ///
    /// `None` if the size does not fit in `usize` (only possible on targets
    /// narrower than 64 bits).
    pub fn frame_len(&self) -> Option<usize> {
        usize::try_from(self.payload_length)
            .ok()?
            .checked_add(FRAME_HEADER_SIZE)
    }

    /// Writes the header in wire order.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u32(self.sequence_key);
        buf.put_u32(self.payload_length);
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record identifier carried in the frame header. Not checked for ordering.
    pub sequence_key: u32,
    /// Opaque payload, exactly as long as the header declared.
    pub payload: Bytes,
}

impl Record {
    /// Creates a new record.
    pub fn new(sequence_key: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_key,
            payload: payload.into(),
        }
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encodes the record as a single frame.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Appends the record's frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload_length =
            u32::try_from(self.payload.len()).map_err(|_| ProtocolError::RecordTooLarge {
                size: self.payload.len() as u64,
                max: u32::MAX as u64,
            })?;

        let header = FrameHeader {
            sequence_key: self.sequence_key,
            payload_length,
        };
        buf.reserve(FRAME_HEADER_SIZE + self.payload.len());
        header.encode_into(buf);
        buf.put_slice(&self.payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let buf = [0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x10, 0xAA];
        let header = FrameHeader::parse(&buf).unwrap();
        assert_eq!(header.sequence_key, 0x0102);
        assert_eq!(header.payload_length, 16);
        assert_eq!(header.frame_len(), Some(24));
    }

    #[test]
    fn test_header_too_short() {
        assert!(FrameHeader::parse(&[0u8; 7]).is_none());
        assert!(FrameHeader::parse(&[]).is_none());
    }

    #[test]
    fn test_header_max_values() {
        let header = FrameHeader::parse(&[0xFF; 8]).unwrap();
        assert_eq!(header.sequence_key, u32::MAX);
        assert_eq!(header.payload_length, u32::MAX);

        let expected = (u32::MAX as usize).checked_add(FRAME_HEADER_SIZE);
        assert_eq!(header.frame_len(), expected);
    }

    #[test]
    fn test_record_encode_layout() {
        let record = Record::new(5, &b"abc"[..]);
        let encoded = record.encode().unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[0, 0, 0, 5, 0, 0, 0, 3, b'a', b'b', b'c'][..]
        );
    }

    #[test]
    fn test_empty_payload() {
        let record = Record::new(6, Bytes::new());
        assert!(record.is_empty());

        let encoded = record.encode().unwrap();
        assert_eq!(encoded.as_ref(), &[0, 0, 0, 6, 0, 0, 0, 0][..]);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader {
            sequence_key: 19_000_000,
            payload_length: 1234,
        };
        let mut buf = BytesMut::new();
        header.encode_into(&mut buf);
        assert_eq!(buf.len(), FRAME_HEADER_SIZE);
        assert_eq!(FrameHeader::parse(&buf), Some(header));
    }
}
