//! Record consumer interface.

use crate::error::CoreError;
use blockdl_protocol::Record;

/// Receives decoded records one at a time, in stream order.
///
/// `consume` runs on the pipeline's task and may block (buffered writes,
/// metrics). The next chunk is not read until it returns, so a slow consumer
/// slows the download instead of growing a backlog.
pub trait RecordConsumer {
    /// Handles one record. An error aborts the download.
    fn consume(&mut self, record: &Record) -> Result<(), CoreError>;

    /// Called once when the pipeline stops, whether the stream completed,
    /// was cancelled, or failed.
    fn finish(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}

impl<C: RecordConsumer + ?Sized> RecordConsumer for &mut C {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        (**self).consume(record)
    }

    fn finish(&mut self) -> Result<(), CoreError> {
        (**self).finish()
    }
}

impl<C: RecordConsumer + ?Sized> RecordConsumer for Box<C> {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        (**self).consume(record)
    }

    fn finish(&mut self) -> Result<(), CoreError> {
        (**self).finish()
    }
}

/// Hands each record to both consumers, first `A` then `B`.
impl<A: RecordConsumer, B: RecordConsumer> RecordConsumer for (A, B) {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        self.0.consume(record)?;
        self.1.consume(record)
    }

    fn finish(&mut self) -> Result<(), CoreError> {
        // Both get to finish even if the first fails.
        let first = self.0.finish();
        let second = self.1.finish();
        first.and(second)
    }
}

/// Collects records in memory.
impl RecordConsumer for Vec<Record> {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        self.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        seen: Vec<u32>,
        finished: bool,
        fail_finish: bool,
    }

    impl RecordConsumer for Counting {
        fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
            self.seen.push(record.sequence_key);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), CoreError> {
            self.finished = true;
            if self.fail_finish {
                return Err(CoreError::Rejected {
                    sequence_key: 0,
                    reason: "finish failed".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_pair_fans_out_in_order() {
        let mut pair = (Counting::default(), Vec::<Record>::new());
        pair.consume(&Record::new(1, &b"a"[..])).unwrap();
        pair.consume(&Record::new(2, &b"b"[..])).unwrap();
        pair.finish().unwrap();

        assert_eq!(pair.0.seen, vec![1, 2]);
        assert!(pair.0.finished);
        assert_eq!(pair.1.len(), 2);
        assert_eq!(pair.1[1].sequence_key, 2);
    }

    #[test]
    fn test_pair_finishes_both_on_error() {
        let mut pair = (
            Counting {
                fail_finish: true,
                ..Default::default()
            },
            Counting::default(),
        );
        assert!(pair.finish().is_err());
        assert!(pair.0.finished);
        assert!(pair.1.finished);
    }

    #[test]
    fn test_boxed_and_borrowed() {
        fn drive<C: RecordConsumer>(mut consumer: C) {
            consumer.consume(&Record::new(9, &b""[..])).unwrap();
            consumer.finish().unwrap();
        }

        let mut inner = Counting::default();
        drive(&mut inner);
        assert_eq!(inner.seen, vec![9]);
        assert!(inner.finished);

        let mut boxed: Box<dyn RecordConsumer> = Box::new(Vec::<Record>::new());
        boxed.consume(&Record::new(1, &b"x"[..])).unwrap();
        boxed.finish().unwrap();
    }
}
