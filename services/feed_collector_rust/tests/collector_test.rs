//! Collector lifecycle and storage gateway integration tests.
//!
//! Upstream endpoints point at unroutable addresses: ingestion errors are
//! recoverable by design, so the state machine is fully exercisable without
//! a network.

use feed_collector_rust::{Collector, CollectorState, Config, FeedMode};
use oddsfeed_rust_core::storage::{StorageConfig, StorageGateway, StorageType};
use oddsfeed_rust_core::{FeedError, MarketOdds, Match, OddsQuote, OddsSet, SnapshotMetadata, Sport};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn test_config(feed_mode: FeedMode, dir: &Path) -> Config {
    Config {
        redis_url: "redis://127.0.0.1:1".to_string(),
        cache_key_prefix: "oddsfeed:test".to_string(),
        snapshot_file: dir.join("matches.json"),
        push_feed_base_url: "http://127.0.0.1:1".to_string(),
        delta_feed_base_url: "http://127.0.0.1:1".to_string(),
        feed_mode,
        autostart: false,
        default_interval_secs: 10,
        default_sport: "football".to_string(),
    }
}

fn file_collector(feed_mode: FeedMode, dir: &Path) -> Collector {
    let config = test_config(feed_mode, dir);
    let storage = Arc::new(StorageGateway::with_file(&config.snapshot_file));
    Collector::new(&config, storage)
}

fn sample_match(id: i64) -> Match {
    let mut odds = OddsSet::new();
    odds.insert(
        "fullTimeResultHomeWin".to_string(),
        MarketOdds::Single(OddsQuote {
            value: 1.85,
            pick_code: 1,
        }),
    );
    let mut lines = std::collections::HashMap::new();
    lines.insert(
        "2.5".to_string(),
        OddsQuote {
            value: 1.92,
            pick_code: 240,
        },
    );
    odds.insert("totalGoalsOver".to_string(), MarketOdds::Lines(lines));
    Match {
        id,
        match_code: format!("MC{}", id),
        home: "Home FC".to_string(),
        away: "Away FC".to_string(),
        league: "Premier League".to_string(),
        league_short: "PL".to_string(),
        sport: Sport::Football,
        kick_off_time: 1_700_000_000_000,
        status: "active".to_string(),
        is_live: true,
        blocked: false,
        favourite: false,
        last_change_time: 1,
        odds,
    }
}

fn meta() -> SnapshotMetadata {
    SnapshotMetadata {
        last_updated: 1_700_000_100_000,
        collection_interval: 10,
        selected_sport: Sport::Football,
        total_matches: 2,
        total_leagues: 1,
    }
}

#[tokio::test]
async fn test_start_rejects_bad_interval_and_leaves_state_unchanged() {
    let dir = tempdir().unwrap();
    let collector = file_collector(FeedMode::DeltaPoll, dir.path());

    let result = collector.start(7, "football").await;
    assert!(matches!(result, Err(FeedError::InvalidArgument(_))));
    assert_eq!(collector.state().await, CollectorState::Idle);
}

#[tokio::test]
async fn test_start_rejects_unknown_sport() {
    let dir = tempdir().unwrap();
    let collector = file_collector(FeedMode::DeltaPoll, dir.path());

    let result = collector.start(10, "handball").await;
    assert!(matches!(result, Err(FeedError::InvalidArgument(_))));
    assert_eq!(collector.state().await, CollectorState::Idle);
}

#[tokio::test]
async fn test_push_mode_has_its_own_allow_list() {
    let dir = tempdir().unwrap();
    let collector = file_collector(FeedMode::PushStream, dir.path());

    // 1s is valid for delta polling but not for the push stream
    let result = collector.start(1, "football").await;
    assert!(matches!(result, Err(FeedError::InvalidArgument(_))));
    assert_eq!(collector.state().await, CollectorState::Idle);
}

#[tokio::test]
async fn test_valid_start_transitions_and_stop_returns_to_idle() {
    let dir = tempdir().unwrap();
    let collector = file_collector(FeedMode::DeltaPoll, dir.path());

    collector.start(10, "basketball").await.unwrap();
    assert_ne!(collector.state().await, CollectorState::Idle);

    let status = collector.status().await;
    assert!(status.is_running);
    assert_eq!(status.selected_sport, "basketball");
    assert_eq!(status.collection_interval_secs, 10);
    assert_eq!(status.storage_type, "file");

    // Starting again while running is a no-op, not an error
    collector.start(10, "basketball").await.unwrap();

    collector.stop().await;
    assert_eq!(collector.state().await, CollectorState::Idle);
    assert!(!collector.status().await.is_running);

    // Stop flushed a final snapshot document
    assert!(dir.path().join("matches.json").exists());

    // Stopping an idle collector is a no-op
    collector.stop().await;
    assert_eq!(collector.state().await, CollectorState::Idle);
}

#[tokio::test]
async fn test_all_valid_interval_sport_pairs_start() {
    for mode in [FeedMode::PushStream, FeedMode::DeltaPoll] {
        for &interval in mode.allowed_intervals() {
            for sport in ["football", "basketball", "tennis"] {
                let dir = tempdir().unwrap();
                let collector = file_collector(mode, dir.path());
                collector.start(interval, sport).await.unwrap();
                assert_ne!(collector.state().await, CollectorState::Idle);
                collector.stop().await;
            }
        }
    }
}

#[tokio::test]
async fn test_cache_failure_falls_back_to_file_mode() {
    let dir = tempdir().unwrap();
    let gateway = StorageGateway::initialize(StorageConfig {
        redis_url: "redis://127.0.0.1:1".to_string(),
        key_prefix: "oddsfeed:test".to_string(),
        file_path: dir.path().join("fallback.json"),
    })
    .await;

    assert_eq!(gateway.storage_type(), StorageType::File);
    assert!(!gateway.is_cache_connected().await);

    gateway
        .save_snapshot(&[sample_match(1)], &meta())
        .await
        .unwrap();
    assert_eq!(gateway.load_snapshot().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_round_trip_preserves_ids_and_odds() {
    let dir = tempdir().unwrap();
    let gateway = StorageGateway::with_file(dir.path().join("matches.json"));

    let saved = vec![sample_match(1), sample_match(2)];
    gateway.save_snapshot(&saved, &meta()).await.unwrap();
    let loaded = gateway.load_snapshot().await.unwrap();

    let mut saved_ids: Vec<i64> = saved.iter().map(|m| m.id).collect();
    let mut loaded_ids: Vec<i64> = loaded.iter().map(|m| m.id).collect();
    saved_ids.sort();
    loaded_ids.sort();
    assert_eq!(saved_ids, loaded_ids);

    for original in &saved {
        let restored = loaded.iter().find(|m| m.id == original.id).unwrap();
        assert_eq!(restored.odds, original.odds);
    }

    gateway.clear_all().await.unwrap();
    assert!(gateway.load_snapshot().await.unwrap().is_empty());
}
