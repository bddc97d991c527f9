//! Download pipeline.
//!
//! Drives a [`RecordStream`] into a [`RecordConsumer`] until the stream ends,
//! fails, or a shutdown signal arrives. Shutdown is observed between records
//! and while waiting on the network, never in the middle of a chunk.

use crate::consumer::RecordConsumer;
use crate::error::CoreError;
use blockdl_client::{ChunkSource, RecordStream, StreamStats};
use tokio::sync::broadcast;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// The stream ended cleanly and every record was consumed.
    Completed,
    /// A shutdown signal stopped the run early.
    Cancelled,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    /// Records handed to the consumer during this run.
    pub records: u64,
    /// Sequence key of the last consumed record.
    ///
    /// A cancelled download can be resumed from here with
    /// [`StreamRequest::resume_after`](blockdl_client::StreamRequest::resume_after).
    pub last_sequence_key: Option<u32>,
    pub stats: StreamStats,
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == PipelineStatus::Completed
    }
}

/// Feeds decoded records to a consumer.
pub struct Pipeline<C> {
    consumer: C,
    records: u64,
    last_sequence_key: Option<u32>,
}

impl<C: RecordConsumer> Pipeline<C> {
    pub fn new(consumer: C) -> Self {
        Self {
            consumer,
            records: 0,
            last_sequence_key: None,
        }
    }

    /// Runs until the stream ends, an error occurs, or `shutdown` fires.
    ///
    /// The consumer's `finish` is called in every case so that records
    /// already received are persisted. On cancellation the decoder is not
    /// finalized: a partial frame in flight is discarded, not reported.
    /// A closed shutdown channel does not cancel the run.
    pub async fn run<S: ChunkSource>(
        &mut self,
        stream: &mut RecordStream<S>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<PipelineOutcome, CoreError> {
        let started = self.records;

        let status = loop {
            let next = tokio::select! {
                biased;
                Ok(()) = shutdown.recv() => {
                    tracing::info!(
                        records = self.records - started,
                        last_block = ?self.last_sequence_key,
                        buffered = stream.decoder().buffered(),
                        "download cancelled"
                    );
                    break PipelineStatus::Cancelled;
                }
                next = stream.next_record() => next,
            };

            let step = match next {
                Ok(Some(record)) => {
                    let key = record.sequence_key;
                    self.consumer.consume(&record).map(|_| Some(key))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(CoreError::from(e)),
            };

            match step {
                Ok(Some(key)) => {
                    self.records += 1;
                    self.last_sequence_key = Some(key);
                }
                Ok(None) => break PipelineStatus::Completed,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        records = self.records - started,
                        last_block = ?self.last_sequence_key,
                        "download failed"
                    );
                    if let Err(finish_err) = self.consumer.finish() {
                        tracing::warn!(error = %finish_err, "failed to finish consumer");
                    }
                    return Err(e);
                }
            }
        };

        self.consumer.finish()?;

        Ok(PipelineOutcome {
            status,
            records: self.records - started,
            last_sequence_key: self.last_sequence_key,
            stats: stream.stats(),
        })
    }

    /// Returns the sequence key of the last consumed record.
    pub fn last_sequence_key(&self) -> Option<u32> {
        self.last_sequence_key
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn into_consumer(self) -> C {
        self.consumer
    }
}
