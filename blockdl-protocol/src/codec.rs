//! Encoder and incremental decoder for record frames.
//!
//! [`FrameDecoder`] turns a sequence of arbitrarily sized byte chunks into
//! records. Chunk boundaries may fall anywhere: inside a header, inside a
//! payload, or exactly between frames. The decoded output does not depend on
//! where they fall.
//!
//! ```
//! use blockdl_protocol::FrameDecoder;
//!
//! let wire = [0, 0, 0, 5, 0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 6, 0, 0, 0, 0];
//! let mut decoder = FrameDecoder::new();
//!
//! let mut records = Vec::new();
//! for chunk in [&wire[..7], &wire[7..]] {
//!     for record in decoder.ingest(chunk) {
//!         records.push(record.unwrap());
//!     }
//! }
//! decoder.finalize().unwrap();
//!
//! assert_eq!(records[0].sequence_key, 5);
//! assert_eq!(&records[0].payload[..], b"abc");
//! assert_eq!(records[1].sequence_key, 6);
//! assert!(records[1].payload.is_empty());
//! ```

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, Record, FRAME_HEADER_SIZE};
use crate::DEFAULT_MAX_PAYLOAD_SIZE;
use bytes::{Buf, BytesMut};
use std::iter::FusedIterator;

/// Initial carry buffer capacity (8 KiB, one typical HTTP read).
const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Encodes records into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a single record.
    pub fn encode_record(record: &Record) -> Result<BytesMut, ProtocolError> {
        record.encode()
    }

    /// Encodes records back to back, as they would appear on the wire.
    pub fn encode_records<'a, I>(records: I) -> Result<BytesMut, ProtocolError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut buf = BytesMut::new();
        for record in records {
            record.encode_into(&mut buf)?;
        }
        Ok(buf)
    }
}

/// Incremental frame decoder.
///
/// Holds the bytes that have been received but not yet resolved into a
/// complete frame (the carry buffer). Consumed frames are split off the
/// front of the buffer, so it only ever holds the tail of the stream: at
/// most one incomplete frame plus whatever the last chunk brought in.
///
/// A decoder belongs to exactly one stream and one reader. It is `Send`, but
/// all operations take `&mut self`; share it across tasks only behind your
/// own synchronization.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload_size: Option<u32>,
    /// First fatal error; once set the decoder ignores further input.
    failed: Option<ProtocolError>,
    records_decoded: u64,
    bytes_consumed: u64,
}

impl FrameDecoder {
    /// Creates a decoder with the default payload ceiling.
    pub fn new() -> Self {
        Self::with_max_payload_size(Some(DEFAULT_MAX_PAYLOAD_SIZE))
    }

    /// Creates a decoder with an explicit payload ceiling.
    ///
    /// `None` accepts any length the header can express (up to 4 GiB per
    /// frame), which lets a corrupt or hostile stream drive allocation.
    pub fn with_max_payload_size(max_payload_size: Option<u32>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
            failed: None,
            records_decoded: 0,
            bytes_consumed: 0,
        }
    }

    /// Returns the configured payload ceiling.
    pub fn max_payload_size(&self) -> Option<u32> {
        self.max_payload_size
    }

    /// Appends a chunk to the carry buffer without decoding.
    ///
    /// Empty chunks are ignored. The chunk is copied, so the caller may reuse
    /// its buffer as soon as this returns. Input is dropped once the decoder
    /// has failed.
    pub fn extend(&mut self, chunk: &[u8]) {
        if chunk.is_empty() || self.failed.is_some() {
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Feeds a chunk and returns the records it completes.
    ///
    /// Decoding is lazy: each call to `next` on the returned iterator
    /// resolves at most one frame, so callers can act on a record before the
    /// next one is cut from the buffer. Frames left undecoded when the
    /// iterator is dropped stay in the carry buffer and come out of the next
    /// `ingest` or [`decode_next`](Self::decode_next).
    pub fn ingest(&mut self, chunk: &[u8]) -> Records<'_> {
        self.extend(chunk);
        Records {
            decoder: self,
            done: false,
        }
    }

    /// Attempts to decode the next record from the carry buffer.
    ///
    /// Returns `Ok(Some(record))` if a complete frame was available,
    /// `Ok(None)` if more data is needed, or `Err` if the stream is corrupt.
    pub fn decode_next(&mut self) -> Result<Option<Record>, ProtocolError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let header = match FrameHeader::parse(&self.buffer) {
            Some(header) => header,
            None => return Ok(None),
        };

        if let Some(max) = self.max_payload_size {
            if header.payload_length > max {
                return Err(self.fail(ProtocolError::RecordTooLarge {
                    size: header.payload_length as u64,
                    max: max as u64,
                }));
            }
        }

        let frame_len = match header.frame_len() {
            Some(len) => len,
            None => {
                return Err(self.fail(ProtocolError::RecordTooLarge {
                    size: header.payload_length as u64,
                    max: (usize::MAX - FRAME_HEADER_SIZE) as u64,
                }))
            }
        };
        if self.buffer.len() < frame_len {
            return Ok(None);
        }

        self.buffer.advance(FRAME_HEADER_SIZE);
        let payload = self
            .buffer
            .split_to(header.payload_length as usize)
            .freeze();

        self.records_decoded += 1;
        self.bytes_consumed += frame_len as u64;

        Ok(Some(Record {
            sequence_key: header.sequence_key,
            payload,
        }))
    }

    /// Checks that the stream ended on a frame boundary.
    ///
    /// Call once, after the source signals end-of-stream and every pending
    /// record has been drained. Leftover bytes mean the stream was cut short
    /// and are reported, never discarded.
    pub fn finalize(&self) -> Result<(), ProtocolError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if !self.buffer.is_empty() {
            return Err(ProtocolError::IncompleteRecord {
                bytes_remaining: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Returns the number of bytes held in the carry buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether the carry buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns whether the decoder has hit a fatal error.
    pub fn has_failed(&self) -> bool {
        self.failed.is_some()
    }

    /// Returns the number of records decoded so far.
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }

    /// Returns the number of wire bytes resolved into records so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    fn fail(&mut self, err: ProtocolError) -> ProtocolError {
        tracing::warn!(
            error = %err,
            records_decoded = self.records_decoded,
            bytes_consumed = self.bytes_consumed,
            "frame decoder failed"
        );
        // Nothing after a bad header can be framed; release it.
        self.buffer = BytesMut::new();
        self.failed = Some(err.clone());
        err
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Records completed by a call to [`FrameDecoder::ingest`].
///
/// Yields `Ok(record)` for each complete frame, then stops. On a fatal error
/// yields that error once and stops.
pub struct Records<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.decoder.decode_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Records<'_> {}
