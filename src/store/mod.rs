//! # Time-Series Store Contract
//!
//! The simulator and the analytics pipeline only ever reach the time-series
//! store through [`TimeSeriesStore`]: a batch `write` of tagged, fielded points
//! and a `query` returning an aggregated [`Frame`].

pub mod frame;
pub mod memory;
pub mod point;
pub mod request;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use frame::{Frame, FrameRow};
pub use memory::InMemoryStore;
pub use point::DataPoint;
pub use request::{QueryRequest, SeriesSelect, TimeRange, Window, WindowLabel};

/// Store-level failures.
///
/// A failed write leaves the batch in an unknown delivery state: part of it
/// may have been persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("bucket not found: {0}")]
    UnknownBucket(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Write a batch of points into `bucket`
    async fn write(&self, bucket: &str, points: &[DataPoint]) -> Result<(), StoreError>;

    /// Run a read request and return its rows keyed by (timestamp, key tag)
    async fn query(&self, request: &QueryRequest) -> Result<Frame, StoreError>;
}
