//! # blockdl-client
//!
//! Stream source for blockdl.
//!
//! This crate provides:
//! - Request parameters identifying a table stream
//! - An HTTP chunk source over a chunked response body
//! - `RecordStream`, which pulls chunks through a `FrameDecoder` one record
//!   at a time

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod source;
pub mod stream;

pub use client::StreamClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use request::StreamRequest;
pub use source::{ChunkSource, HttpChunkSource, VecChunkSource};
pub use stream::{RecordStream, StreamStats};
