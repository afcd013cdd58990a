//! Collector error taxonomy.
//!
//! Only `InvalidArgument` is surfaced synchronously to callers of the
//! control surface. Every other variant is recovered locally: upstream and
//! decode failures trigger a retry or drop the offending payload, storage
//! failures skip one flush cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Bad interval or sport on Start; rejected synchronously, never retried
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network error, timeout or non-2xx from an upstream fetch
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Malformed frame or JSON payload; the offending record is dropped
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Cache or file backend read/write error; the next flush retries
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl FeedError {
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        FeedError::UpstreamUnavailable(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        FeedError::DecodeFailure(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        FeedError::StorageFailure(err.to_string())
    }
}
