//! Download progress reporting.

use crate::consumer::RecordConsumer;
use crate::error::CoreError;
use blockdl_protocol::Record;
use std::time::{Duration, Instant};

/// Default number of records between progress reports.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 1000;

/// Point-in-time download counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Records seen.
    pub records: u64,
    /// Payload bytes seen.
    pub bytes: u64,
    /// Sequence key of the most recent record.
    pub last_sequence_key: Option<u32>,
    /// Time since tracking started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Records per second over the whole run.
    pub fn records_per_sec(&self) -> f64 {
        rate(self.records as f64, self.elapsed)
    }

    /// Payload megabytes (MiB) per second over the whole run.
    pub fn mb_per_sec(&self) -> f64 {
        rate(self.bytes as f64 / 1024.0 / 1024.0, self.elapsed)
    }
}

fn rate(amount: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// Counts records and logs throughput every `update_interval` records.
#[derive(Debug)]
pub struct ProgressTracker {
    update_interval: u64,
    started: Instant,
    records: u64,
    bytes: u64,
    last_sequence_key: Option<u32>,
}

impl ProgressTracker {
    pub fn new(update_interval: u64) -> Self {
        Self {
            update_interval: update_interval.max(1),
            started: Instant::now(),
            records: 0,
            bytes: 0,
            last_sequence_key: None,
        }
    }

    /// Counts a record. Returns a snapshot when a report is due.
    pub fn update(&mut self, record: &Record) -> Option<ProgressSnapshot> {
        self.records += 1;
        self.bytes += record.len() as u64;
        self.last_sequence_key = Some(record.sequence_key);

        if self.records % self.update_interval == 0 {
            Some(self.snapshot())
        } else {
            None
        }
    }

    /// Returns the current counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            records: self.records,
            bytes: self.bytes,
            last_sequence_key: self.last_sequence_key,
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl RecordConsumer for ProgressTracker {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        if let Some(snapshot) = self.update(record) {
            tracing::info!(
                elapsed = format!("{:.2}s", snapshot.elapsed.as_secs_f64()),
                block = record.sequence_key,
                records_per_sec = format!("{:.2}", snapshot.records_per_sec()),
                mb_per_sec = format!("{:.2}", snapshot.mb_per_sec()),
                "progress"
            );
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CoreError> {
        let snapshot = self.snapshot();
        tracing::info!(
            records = snapshot.records,
            bytes = snapshot.bytes,
            last_block = ?snapshot.last_sequence_key,
            elapsed = format!("{:.2}s", snapshot.elapsed.as_secs_f64()),
            "download finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_every_interval() {
        let mut tracker = ProgressTracker::new(3);
        let record = Record::new(1, &b"abcd"[..]);

        assert!(tracker.update(&record).is_none());
        assert!(tracker.update(&record).is_none());
        let snapshot = tracker.update(&record).unwrap();
        assert_eq!(snapshot.records, 3);
        assert_eq!(snapshot.bytes, 12);

        assert!(tracker.update(&record).is_none());
    }

    #[test]
    fn test_tracks_last_key() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.snapshot().last_sequence_key, None);

        tracker.consume(&Record::new(10, &b""[..])).unwrap();
        tracker.consume(&Record::new(7, &b"x"[..])).unwrap();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.bytes, 1);
        assert_eq!(snapshot.last_sequence_key, Some(7));
        assert!(tracker.finish().is_ok());
    }

    #[test]
    fn test_zero_interval_reports_every_record() {
        let mut tracker = ProgressTracker::new(0);
        assert!(tracker.update(&Record::new(1, &b""[..])).is_some());
    }

    #[test]
    fn test_rates() {
        let snapshot = ProgressSnapshot {
            records: 100,
            bytes: 2 * 1024 * 1024,
            last_sequence_key: Some(99),
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(snapshot.records_per_sec(), 50.0);
        assert_eq!(snapshot.mb_per_sec(), 1.0);

        let idle = ProgressSnapshot {
            elapsed: Duration::ZERO,
            ..snapshot
        };
        assert_eq!(idle.records_per_sec(), 0.0);
    }
}
