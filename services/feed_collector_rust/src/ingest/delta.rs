//! Delta-poll ingestion client.
//!
//! Phase one sweeps the full catalog for the selected sport and pulls the
//! odds card of every eligible event under a bounded worker pool. Phase two
//! polls the changes endpoint with the last opaque token and applies the
//! returned diffs: header patches for known events, detail fetches for new
//! ones (fired without blocking the poll loop, still bounded by the same
//! semaphore), and single-quote updates resolved through the same mapping
//! tables as the full normalization path.

use crate::collector::{flush_snapshot, CollectorState, IngestCounters};
use crate::feeds::delta_api::{CatalogEvent, DeltaFeedClient};
use crate::ingest::pagination::fetch_pages;
use chrono::Utc;
use oddsfeed_rust_core::normalize::{extract_line, line_key, normalize_odds, resolve_named, LineKind};
use oddsfeed_rust_core::storage::StorageGateway;
use oddsfeed_rust_core::{MatchStore, OddsQuote, SessionConfig, Sport};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};

/// Concurrent per-event detail fetches across both phases.
const DETAIL_FETCH_CONCURRENCY: usize = 35;

/// Catalog pagination settings.
const CATALOG_PAGE_SIZE: usize = 50;
const CATALOG_CONCURRENCY: usize = 5;

/// Catalog window: slightly into the past for running events, a week ahead
/// for pre-match.
const CATALOG_LOOKBACK_MS: i64 = 12 * 3_600_000;
const CATALOG_LOOKAHEAD_MS: i64 = 7 * 86_400_000;

/// Poll cadence for a configured collection interval.
pub fn poll_period(interval_secs: u64) -> Duration {
    let secs = match interval_secs {
        1 => 1,
        2..=15 => 2,
        16..=30 => 5,
        _ => 10,
    };
    Duration::from_secs(secs)
}

/// Catalog events worth a detail fetch: playable and either already live
/// or not yet kicked off.
fn eligible(event: &CatalogEvent, now_ms: i64) -> bool {
    event.playable && (event.live || event.start_time >= now_ms)
}

pub struct DeltaPolling {
    pub api: Arc<DeltaFeedClient>,
    pub store: MatchStore,
    pub storage: Arc<StorageGateway>,
    pub session: Arc<RwLock<SessionConfig>>,
    pub state: Arc<RwLock<CollectorState>>,
    pub running: Arc<std::sync::atomic::AtomicBool>,
    pub counters: Arc<IngestCounters>,
    pub sport: Sport,
    pub interval_secs: u64,
}

impl DeltaPolling {
    pub async fn run(self) {
        let detail_semaphore = Arc::new(Semaphore::new(DETAIL_FETCH_CONCURRENCY));

        self.initial_sweep(&detail_semaphore).await;
        if !self.is_running() {
            return;
        }
        *self.state.write().await = CollectorState::Active;

        let period = poll_period(self.interval_secs);
        info!(
            "Initial sweep done, {} matches in store, polling deltas every {:?}",
            self.store.len().await,
            period
        );

        loop {
            tokio::time::sleep(period).await;
            if !self.is_running() {
                break;
            }
            self.poll_once(&detail_semaphore).await;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn detail_context(&self) -> DetailContext {
        DetailContext {
            api: self.api.clone(),
            store: self.store.clone(),
            counters: self.counters.clone(),
            sport: self.sport,
        }
    }

    /// Full catalog sweep plus a bounded fan-out of detail fetches.
    async fn initial_sweep(&self, detail_semaphore: &Arc<Semaphore>) {
        let now_ms = Utc::now().timestamp_millis();
        let date_from = now_ms - CATALOG_LOOKBACK_MS;
        let date_to = now_ms + CATALOG_LOOKAHEAD_MS;

        let api = self.api.clone();
        let sport = self.sport;
        let events = fetch_pages(CATALOG_PAGE_SIZE, CATALOG_CONCURRENCY, move |page| {
            let api = api.clone();
            async move {
                api.fetch_catalog_page(
                    sport,
                    CATALOG_PAGE_SIZE,
                    page * CATALOG_PAGE_SIZE,
                    date_from,
                    date_to,
                )
                .await
            }
        })
        .await;

        let total = events.len();
        let targets: Vec<CatalogEvent> = events
            .into_iter()
            .filter(|e| eligible(e, now_ms))
            .collect();
        info!(
            "Catalog sweep: {} events, {} eligible for odds fetch",
            total,
            targets.len()
        );

        let ctx = self.detail_context();
        for_each_bounded(detail_semaphore.clone(), targets, move |event| {
            let ctx = ctx.clone();
            async move {
                ctx.fetch_and_store(event.region_id, event.competition_id, event.id)
                    .await;
            }
        })
        .await;

        self.session.write().await.last_processed_time = Utc::now().timestamp_millis();
    }

    /// One changes-endpoint round trip and diff application.
    async fn poll_once(&self, detail_semaphore: &Arc<Semaphore>) {
        let token = self.session.read().await.delta_cache_token.clone();
        let changes = match self.api.fetch_changes(token.as_deref()).await {
            Ok(changes) => changes,
            Err(e) => {
                warn!("Delta poll failed: {}", e);
                return;
            }
        };

        {
            let mut session = self.session.write().await;
            session.delta_cache_token = changes.token.clone();
            session.last_processed_time = Utc::now().timestamp_millis();
        }

        let mut applied: u64 = 0;

        for event in changes.events {
            if self.store.contains(event.id).await {
                if self.store.patch_header(event.id, event.into_patch()).await {
                    applied += 1;
                }
            } else {
                // New event: full odds card, without stalling the poll loop
                let (region_id, competition_id, id) =
                    (event.region_id, event.competition_id, event.id);
                let ctx = self.detail_context();
                let semaphore = detail_semaphore.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    ctx.fetch_and_store(region_id, competition_id, id).await;
                });
                applied += 1;
            }
        }

        for change in changes.odds {
            let Some(target) = resolve_named(self.sport, &change.bet_type, &change.outcome)
            else {
                self.counters
                    .unrecognized_markets
                    .fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let line = match target.line {
                LineKind::None => None,
                LineKind::Total | LineKind::Handicap => {
                    match change.special_value.as_deref().and_then(extract_line) {
                        Some(value) => Some(line_key(value)),
                        None => {
                            self.counters
                                .unrecognized_markets
                                .fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }
                }
            };
            let quote = OddsQuote {
                value: change.value,
                pick_code: change.pick_code,
            };
            if self
                .store
                .apply_quote(change.event_id, target.key, line, quote)
                .await
            {
                applied += 1;
            } else {
                debug!("Odds change for unknown event {}", change.event_id);
            }
        }

        if applied > 0 {
            self.counters
                .deltas_applied
                .fetch_add(applied, Ordering::Relaxed);
            if let Err(e) = flush_snapshot(&self.store, &self.storage, &self.session).await {
                warn!("Post-delta snapshot flush failed: {}", e);
            }
        }
    }
}

/// The handles one detail fetch needs; cloned into spawned workers.
#[derive(Clone)]
struct DetailContext {
    api: Arc<DeltaFeedClient>,
    store: MatchStore,
    counters: Arc<IngestCounters>,
    sport: Sport,
}

impl DetailContext {
    async fn fetch_and_store(&self, region_id: i64, competition_id: i64, event_id: i64) {
        match self
            .api
            .fetch_event_details(self.sport, region_id, competition_id, event_id)
            .await
        {
            Ok(details) => {
                let normalized = normalize_odds(self.sport, &details.raw_records());
                self.counters
                    .unrecognized_markets
                    .fetch_add(normalized.unrecognized as u64, Ordering::Relaxed);
                self.store
                    .upsert(details.into_match(self.sport, normalized.odds))
                    .await;
            }
            Err(e) => warn!("Detail fetch for event {} failed: {}", event_id, e),
        }
    }
}

/// Run a job per item with at most `semaphore` permits in flight. The
/// submitting loop blocks on acquire when the pool is saturated.
pub(crate) async fn for_each_bounded<T, F, Fut>(semaphore: Arc<Semaphore>, items: Vec<T>, f: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let fut = f(item);
        handles.push(tokio::spawn(async move {
            fut.await;
            drop(permit);
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}
