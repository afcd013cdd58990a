//! Collector state machine.
//!
//! Owns the session, the match store and the save timer, and launches one
//! of the two ingestion strategies. One collector instance per feed/sport;
//! instances share nothing mutable, so a live and a pre-match collector can
//! run side by side.

use crate::config::Config;
use crate::feeds::delta_api::DeltaFeedClient;
use crate::feeds::push_api::PushFeedClient;
use crate::ingest::delta::DeltaPolling;
use crate::ingest::stream::StreamIngestion;
use chrono::Utc;
use oddsfeed_rust_core::storage::StorageGateway;
use oddsfeed_rust_core::{FeedError, Match, MatchStore, SessionConfig, SnapshotMetadata, Sport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Ingestion strategy, fixed per collector instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedMode {
    /// Server-push event stream (bootstrap + continuous)
    PushStream,
    /// Full catalog sweep + incremental delta polling
    DeltaPoll,
}

impl FeedMode {
    pub fn parse(s: &str) -> Option<FeedMode> {
        match s.to_lowercase().as_str() {
            "push" | "stream" => Some(FeedMode::PushStream),
            "delta" | "poll" => Some(FeedMode::DeltaPoll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::PushStream => "push-stream",
            FeedMode::DeltaPoll => "delta-poll",
        }
    }

    /// Collection intervals each provider accepts.
    pub fn allowed_intervals(&self) -> &'static [u64] {
        match self {
            FeedMode::PushStream => &[5, 10, 30, 60],
            FeedMode::DeltaPoll => &[1, 5, 10, 15, 30, 60],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Bootstrapping,
    Active,
    Stopping,
}

impl CollectorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorState::Idle => "idle",
            CollectorState::Bootstrapping => "bootstrapping",
            CollectorState::Active => "active",
            CollectorState::Stopping => "stopping",
        }
    }
}

/// Observability totals, shared with the ingestion tasks.
#[derive(Debug, Default)]
pub struct IngestCounters {
    pub frames_processed: AtomicU64,
    pub deltas_applied: AtomicU64,
    pub unrecognized_markets: AtomicU64,
}

/// Read-only view returned by `status()`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: &'static str,
    pub feed_mode: &'static str,
    pub is_running: bool,
    pub collection_interval_secs: u64,
    pub selected_sport: &'static str,
    pub has_delta_token: bool,
    pub last_processed_time: i64,
    pub total_matches: usize,
    pub matches_with_odds: usize,
    pub per_sport: HashMap<String, usize>,
    pub total_leagues: usize,
    pub storage_type: &'static str,
    pub cache_connected: bool,
    pub frames_processed: u64,
    pub deltas_applied: u64,
    pub unrecognized_markets: u64,
}

pub struct Collector {
    mode: FeedMode,
    push_base_url: String,
    delta_base_url: String,
    store: MatchStore,
    storage: Arc<StorageGateway>,
    state: Arc<RwLock<CollectorState>>,
    session: Arc<RwLock<SessionConfig>>,
    running: Arc<AtomicBool>,
    counters: Arc<IngestCounters>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Collector {
    pub fn new(config: &Config, storage: Arc<StorageGateway>) -> Self {
        Self {
            mode: config.feed_mode,
            push_base_url: config.push_feed_base_url.clone(),
            delta_base_url: config.delta_feed_base_url.clone(),
            store: MatchStore::new(),
            storage,
            state: Arc::new(RwLock::new(CollectorState::Idle)),
            session: Arc::new(RwLock::new(SessionConfig::default())),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(IngestCounters::default()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Begin a collection session.
    ///
    /// Rejects bad arguments synchronously; a start while already running
    /// is a no-op. The persisted snapshot is cleared best-effort before
    /// ingestion launches.
    pub async fn start(&self, interval_secs: u64, sport_code: &str) -> Result<(), FeedError> {
        let sport = Sport::parse(sport_code).ok_or_else(|| {
            FeedError::InvalidArgument(format!("unsupported sport: {}", sport_code))
        })?;
        if !self.mode.allowed_intervals().contains(&interval_secs) {
            return Err(FeedError::InvalidArgument(format!(
                "interval {}s not allowed for {} mode",
                interval_secs,
                self.mode.as_str()
            )));
        }

        {
            let mut state = self.state.write().await;
            if matches!(
                *state,
                CollectorState::Active | CollectorState::Bootstrapping
            ) {
                info!("Collector already running, ignoring start");
                return Ok(());
            }
            *state = CollectorState::Bootstrapping;
        }

        // Stale persisted state is cleared best-effort; collection proceeds
        // even when the backend is down.
        if let Err(e) = self.storage.clear_all().await {
            warn!("Failed to clear persisted snapshot, continuing: {}", e);
        }
        self.store.clear().await;
        {
            let mut session = self.session.write().await;
            *session = SessionConfig {
                is_running: true,
                collection_interval_secs: interval_secs,
                selected_sport: sport,
                delta_cache_token: None,
                last_processed_time: 0,
            };
        }
        self.running.store(true, Ordering::SeqCst);

        info!(
            "Starting {} collection for {} (interval {}s)",
            self.mode.as_str(),
            sport.code(),
            interval_secs
        );

        let ingest = match self.mode {
            FeedMode::PushStream => {
                let client = StreamIngestion {
                    api: Arc::new(PushFeedClient::new(&self.push_base_url)),
                    store: self.store.clone(),
                    session: self.session.clone(),
                    state: self.state.clone(),
                    running: self.running.clone(),
                    counters: self.counters.clone(),
                    sport,
                };
                tokio::spawn(client.run())
            }
            FeedMode::DeltaPoll => {
                let client = DeltaPolling {
                    api: Arc::new(DeltaFeedClient::new(&self.delta_base_url)),
                    store: self.store.clone(),
                    storage: self.storage.clone(),
                    session: self.session.clone(),
                    state: self.state.clone(),
                    running: self.running.clone(),
                    counters: self.counters.clone(),
                    sport,
                    interval_secs,
                };
                tokio::spawn(client.run())
            }
        };

        let saver = tokio::spawn(save_loop(
            self.store.clone(),
            self.storage.clone(),
            self.session.clone(),
            self.running.clone(),
            interval_secs,
        ));

        self.tasks.lock().await.extend([ingest, saver]);
        Ok(())
    }

    /// End the session: cancel ingestion and the save timer, flush one
    /// final snapshot over a frozen copy of the store, return to idle.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if *state == CollectorState::Idle {
                return;
            }
            *state = CollectorState::Stopping;
        }
        self.running.store(false, Ordering::SeqCst);

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);

        if let Err(e) = flush_snapshot(&self.store, &self.storage, &self.session).await {
            warn!("Final snapshot flush failed: {}", e);
        }

        {
            let mut session = self.session.write().await;
            session.is_running = false;
            session.delta_cache_token = None;
        }
        *self.state.write().await = CollectorState::Idle;
        info!("Collector stopped");
    }

    pub async fn status(&self) -> StatusSnapshot {
        let state = *self.state.read().await;
        let session = self.session.read().await.clone();
        let counts = self.store.counts().await;

        StatusSnapshot {
            state: state.as_str(),
            feed_mode: self.mode.as_str(),
            is_running: session.is_running,
            collection_interval_secs: session.collection_interval_secs,
            selected_sport: session.selected_sport.code(),
            has_delta_token: session.delta_cache_token.is_some(),
            last_processed_time: session.last_processed_time,
            total_matches: counts.total,
            matches_with_odds: counts.with_odds,
            per_sport: counts
                .per_sport
                .iter()
                .map(|(sport, n)| (sport.code().to_string(), *n))
                .collect(),
            total_leagues: counts.leagues,
            storage_type: self.storage.storage_type().as_str(),
            cache_connected: self.storage.is_cache_connected().await,
            frames_processed: self.counters.frames_processed.load(Ordering::Relaxed),
            deltas_applied: self.counters.deltas_applied.load(Ordering::Relaxed),
            unrecognized_markets: self.counters.unrecognized_markets.load(Ordering::Relaxed),
        }
    }

    pub async fn state(&self) -> CollectorState {
        *self.state.read().await
    }

    pub async fn matches(&self) -> Vec<Match> {
        self.store.all().await
    }

    pub async fn match_by_id(&self, id: i64) -> Option<Match> {
        self.store.get(id).await
    }
}

/// Persist a frozen copy of the store with current run metadata.
pub(crate) async fn flush_snapshot(
    store: &MatchStore,
    storage: &StorageGateway,
    session: &RwLock<SessionConfig>,
) -> Result<(), FeedError> {
    let matches = store.all().await;
    let counts = store.counts().await;
    let session = session.read().await.clone();
    let meta = SnapshotMetadata {
        last_updated: Utc::now().timestamp_millis(),
        collection_interval: session.collection_interval_secs,
        selected_sport: session.selected_sport,
        total_matches: counts.total,
        total_leagues: counts.leagues,
    };
    storage.save_snapshot(&matches, &meta).await
}

async fn save_loop(
    store: MatchStore,
    storage: Arc<StorageGateway>,
    session: Arc<RwLock<SessionConfig>>,
    running: Arc<AtomicBool>,
    interval_secs: u64,
) {
    let period = Duration::from_secs(interval_secs.max(1));
    loop {
        tokio::time::sleep(period).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = flush_snapshot(&store, &storage, &session).await {
            warn!("Periodic snapshot flush failed: {}", e);
        }
    }
}
