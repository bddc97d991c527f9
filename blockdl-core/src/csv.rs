//! CSV output.
//!
//! One row per record:
//!
//! ```text
//! block_number,data
//! 5,0x616263
//! 6,0x
//! ```
//!
//! Payloads are opaque bytes and are written as `0x`-prefixed lowercase hex.

use crate::consumer::RecordConsumer;
use crate::error::CoreError;
use blockdl_protocol::Record;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// CSV header row.
pub const CSV_HEADER: &str = "block_number,data\n";

/// Default number of rows buffered between writes.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Writes records to a CSV file in batches.
pub struct CsvSink {
    path: PathBuf,
    file: File,
    batch_size: usize,
    pending: String,
    pending_rows: usize,
    rows_written: u64,
}

impl CsvSink {
    /// Creates (or truncates) the file at `path` and writes the header row.
    ///
    /// Missing parent directories are created.
    pub fn create(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        create_parent_dir(&path)?;

        let mut file = File::create(&path).map_err(|e| output_error(&path, e))?;
        file.write_all(CSV_HEADER.as_bytes())
            .map_err(|e| output_error(&path, e))?;

        tracing::debug!(path = %path.display(), batch_size, "created CSV output");
        Ok(Self::new(path, file, batch_size))
    }

    /// Opens the file at `path` for appending, keeping existing rows.
    ///
    /// Used to continue a cancelled download. The header row is written only
    /// if the file is missing or empty.
    pub fn append(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        create_parent_dir(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| output_error(&path, e))?;
        let existing = file.metadata().map_err(|e| output_error(&path, e))?.len();
        if existing == 0 {
            file.write_all(CSV_HEADER.as_bytes())
                .map_err(|e| output_error(&path, e))?;
        }

        tracing::debug!(
            path = %path.display(),
            batch_size,
            existing_bytes = existing,
            "opened CSV output for append"
        );
        Ok(Self::new(path, file, batch_size))
    }

    fn new(path: PathBuf, file: File, batch_size: usize) -> Self {
        Self {
            path,
            file,
            batch_size: batch_size.max(1),
            pending: String::new(),
            pending_rows: 0,
            rows_written: 0,
        }
    }

    /// Returns the output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of rows this sink has written to the file.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Returns the number of rows buffered but not yet written.
    pub fn pending_rows(&self) -> usize {
        self.pending_rows
    }

    /// Writes buffered rows to the file.
    pub fn flush(&mut self) -> Result<(), CoreError> {
        if self.pending_rows == 0 {
            return Ok(());
        }

        self.file
            .write_all(self.pending.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| output_error(&self.path, e))?;

        self.rows_written += self.pending_rows as u64;
        tracing::trace!(rows = self.pending_rows, total = self.rows_written, "flushed CSV batch");

        self.pending.clear();
        self.pending_rows = 0;
        Ok(())
    }
}

impl RecordConsumer for CsvSink {
    fn consume(&mut self, record: &Record) -> Result<(), CoreError> {
        self.pending.push_str(&format_row(record));
        self.pending_rows += 1;

        if self.pending_rows >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CoreError> {
        self.flush()?;
        self.file
            .sync_all()
            .map_err(|e| output_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), rows = self.rows_written, "closed CSV output");
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if self.pending_rows > 0 {
            if let Err(e) = self.flush() {
                tracing::error!(error = %e, "failed to flush CSV output on drop");
            }
        }
    }
}

/// Formats one CSV row, including the trailing newline.
pub fn format_row(record: &Record) -> String {
    format!("{},0x{}\n", record.sequence_key, hex::encode(&record.payload))
}

fn create_parent_dir(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_error(path, e))?;
    }
    Ok(())
}

fn output_error(path: &Path, source: std::io::Error) -> CoreError {
    CoreError::Output {
        path: path.to_path_buf(),
        source,
    }
}
