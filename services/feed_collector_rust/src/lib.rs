//! feed_collector_rust - live and pre-match odds feed collection.
//!
//! This service:
//! - Ingests odds through one of two strategies: a server-push event stream
//!   or a full catalog sweep followed by incremental delta polling
//! - Normalizes both provider encodings into one canonical odds schema
//! - Maintains the in-memory match store and flushes periodic snapshots
//!   through the storage gateway (redis cache or file fallback)

pub mod collector;
pub mod config;
pub mod feeds;
pub mod ingest;

pub use collector::{Collector, CollectorState, FeedMode, StatusSnapshot};
pub use config::Config;
