//! Pull-driven record stream.
//!
//! A [`RecordStream`] reads a chunk from its source only when every record
//! decoded from earlier chunks has been handed out. The consumer's pace
//! therefore sets the pace of network reads.

use crate::error::ClientError;
use crate::source::ChunkSource;
use blockdl_protocol::{FrameDecoder, Record};
use futures::Stream;

/// Counters for a record stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunks read from the source.
    pub chunks_read: u64,
    /// Bytes read from the source.
    pub bytes_read: u64,
    /// Records handed out.
    pub records_decoded: u64,
}

/// Records decoded from a chunk source.
#[derive(Debug)]
pub struct RecordStream<S> {
    source: S,
    decoder: FrameDecoder,
    exhausted: bool,
    chunks_read: u64,
    bytes_read: u64,
}

impl<S: ChunkSource> RecordStream<S> {
    /// Creates a stream over `source`, decoding with `decoder`.
    pub fn new(source: S, decoder: FrameDecoder) -> Self {
        Self {
            source,
            decoder,
            exhausted: false,
            chunks_read: 0,
            bytes_read: 0,
        }
    }

    /// Returns the next record, or `None` once the stream ended cleanly.
    ///
    /// When the source reports end-of-stream the decoder is finalized; bytes
    /// left in its carry buffer surface as
    /// [`ProtocolError::IncompleteRecord`](blockdl_protocol::ProtocolError::IncompleteRecord).
    /// A source error is returned as-is and the decoder is never finalized.
    ///
    /// Dropping the returned future while it waits on the source loses no
    /// decoded record.
    pub async fn next_record(&mut self) -> Result<Option<Record>, ClientError> {
        loop {
            if let Some(record) = self.decoder.decode_next()? {
                return Ok(Some(record));
            }

            if self.exhausted {
                self.decoder.finalize()?;
                return Ok(None);
            }

            match self.source.next_chunk().await? {
                Some(chunk) => {
                    self.chunks_read += 1;
                    self.bytes_read += chunk.len() as u64;
                    tracing::trace!(
                        len = chunk.len(),
                        buffered = self.decoder.buffered(),
                        "chunk received"
                    );
                    self.decoder.extend(&chunk);
                }
                None => {
                    self.exhausted = true;
                    tracing::debug!(
                        chunks = self.chunks_read,
                        bytes = self.bytes_read,
                        records = self.decoder.records_decoded(),
                        leftover = self.decoder.buffered(),
                        "source exhausted"
                    );
                }
            }
        }
    }

    /// Returns the stream counters.
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            chunks_read: self.chunks_read,
            bytes_read: self.bytes_read,
            records_decoded: self.decoder.records_decoded(),
        }
    }

    /// Returns the decoder.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Returns whether the source has signalled end-of-stream.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Converts into a `futures::Stream`.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, ClientError>> {
        futures::stream::try_unfold(self, |mut stream| async move {
            let next = stream.next_record().await?;
            Ok::<_, ClientError>(next.map(|record| (record, stream)))
        })
    }
}
