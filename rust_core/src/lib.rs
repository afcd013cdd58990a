//! Oddsfeed Core - canonical odds schema and shared collection logic.
//!
//! This library provides:
//! - Canonical match/odds types shared by all feed collectors
//! - Odds normalization from provider-specific wire encodings
//! - In-memory match store with additive merge semantics
//! - Snapshot storage gateway (redis cache with local file fallback)
//! - The collector error taxonomy

pub mod error;
pub mod normalize;
pub mod storage;
pub mod store;
mod types;

pub use error::FeedError;
pub use store::MatchStore;
pub use types::*;
