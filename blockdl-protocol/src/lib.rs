//! # blockdl-protocol
//!
//! Wire format for blockdl record streams.
//!
//! This crate provides:
//! - The 8-byte frame header (sequence key + payload length, both big-endian)
//! - Record encoding for tests, benchmarks and fixtures
//! - An incremental decoder that reassembles records from arbitrarily
//!   fragmented network chunks
//!
//! The crate does no I/O of its own.

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{Encoder, FrameDecoder, Records};
pub use error::ProtocolError;
pub use frame::{FrameHeader, Record, FRAME_HEADER_SIZE};

/// Default ceiling on a declared payload length (64 MiB).
///
/// The header can declare up to `u32::MAX` bytes; the decoder refuses to
/// buffer frames larger than its configured ceiling.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;
