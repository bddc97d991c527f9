//! Chunk sources feeding the frame decoder.

use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

/// A lazy, possibly unbounded sequence of byte chunks.
///
/// End of stream is `Ok(None)`, never a special chunk value. Transport
/// failures are returned as errors and end the stream.
#[async_trait]
pub trait ChunkSource: Send {
    /// Returns the next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError>;
}

/// Chunks from a chunked HTTP response body.
///
/// Network reads larger than `chunk_size` are handed out in `chunk_size`
/// slices; empty reads are skipped.
#[derive(Debug)]
pub struct HttpChunkSource {
    response: reqwest::Response,
    pending: Bytes,
    chunk_size: usize,
    read_timeout: Duration,
}

impl HttpChunkSource {
    pub(crate) fn new(
        response: reqwest::Response,
        chunk_size: usize,
        read_timeout: Duration,
    ) -> Self {
        Self {
            response,
            pending: Bytes::new(),
            chunk_size,
            read_timeout,
        }
    }

    /// Returns the HTTP status of the underlying response.
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
        loop {
            if !self.pending.is_empty() {
                let n = self.pending.len().min(self.chunk_size);
                return Ok(Some(self.pending.split_to(n)));
            }

            let read_timeout = self.read_timeout;
            let read = tokio::time::timeout(read_timeout, self.response.chunk())
                .await
                .map_err(|_| {
                    tracing::debug!("chunk read timeout");
                    ClientError::Timeout {
                        ms: read_timeout.as_millis() as u64,
                    }
                })?;

            match read? {
                Some(chunk) => self.pending = chunk,
                None => return Ok(None),
            }
        }
    }
}

/// Chunks from memory.
///
/// Replays captured streams and drives decoding without a network.
#[derive(Debug, Default)]
pub struct VecChunkSource {
    chunks: VecDeque<Bytes>,
}

impl VecChunkSource {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits `data` into chunks of at most `chunk_size` bytes.
    pub fn from_bytes(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let mut data = data.into();
        let chunk_size = chunk_size.max(1);
        let mut chunks = VecDeque::new();
        while !data.is_empty() {
            let n = data.len().min(chunk_size);
            chunks.push_back(data.split_to(n));
        }
        Self { chunks }
    }

    /// Returns the number of chunks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl ChunkSource for VecChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
        Ok(self.chunks.pop_front())
    }
}
