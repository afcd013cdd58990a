//! Service configuration from environment variables.

use crate::collector::FeedMode;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub redis_url: String,
    /// Namespace for all cache keys of this feed
    pub cache_key_prefix: String,
    /// Snapshot document written in file-fallback mode
    pub snapshot_file: PathBuf,
    pub push_feed_base_url: String,
    pub delta_feed_base_url: String,
    pub feed_mode: FeedMode,
    /// Session started automatically at boot
    pub autostart: bool,
    pub default_interval_secs: u64,
    pub default_sport: String,
}

impl Config {
    pub fn from_env() -> Self {
        let feed_mode = env::var("FEED_MODE")
            .ok()
            .and_then(|v| FeedMode::parse(&v))
            .unwrap_or(FeedMode::PushStream);

        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            cache_key_prefix: env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| "oddsfeed:live".to_string()),
            snapshot_file: env::var("SNAPSHOT_FILE")
                .unwrap_or_else(|_| "data/matches.json".to_string())
                .into(),
            push_feed_base_url: env::var("PUSH_FEED_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string()),
            delta_feed_base_url: env::var("DELTA_FEED_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8082".to_string()),
            feed_mode,
            autostart: env::var("AUTOSTART")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            default_interval_secs: env::var("COLLECTION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            default_sport: env::var("COLLECTION_SPORT")
                .unwrap_or_else(|_| "football".to_string()),
        }
    }
}
