//! # blockdl-core
//!
//! Download pipeline for blockdl.
//!
//! This crate provides:
//! - The record consumer interface and its CSV and progress implementations
//! - The pipeline loop driving a record stream into a consumer, with
//!   cancellation between chunks
//! - File and environment configuration

pub mod config;
pub mod consumer;
pub mod csv;
pub mod error;
pub mod pipeline;
pub mod progress;

pub use config::{Config, ConfigError};
pub use consumer::RecordConsumer;
pub use csv::CsvSink;
pub use error::CoreError;
pub use pipeline::{Pipeline, PipelineOutcome, PipelineStatus};
pub use progress::{ProgressSnapshot, ProgressTracker};
