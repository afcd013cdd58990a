//! Push-stream ingestion client.
//!
//! Phase one opens the bootstrap snapshot stream, accumulates header/bet
//! frames until the upstream closes it, merges the result into the store
//! and derives the resume cursor from the END frame. Phase two follows the
//! continuous live stream from that cursor; only `LIVE`-typed frames are
//! decoded.
//!
//! The byte loop never decodes frames itself: raw frames go onto a bounded
//! channel and a worker task normalizes them, so a slow merge cannot stall
//! receipt of the next chunk. Reconnects use a fixed 5 s delay; after a
//! continuous-phase failure the stored cursor is discarded and a fresh
//! wall-clock cursor is used instead.

use crate::collector::{CollectorState, IngestCounters};
use crate::feeds::push_api::{
    parse_frame, FrameBuffer, PushCodedBet, PushFeedClient, PushPayload, StreamFrame,
};
use chrono::Utc;
use futures_util::StreamExt;
use oddsfeed_rust_core::normalize::{normalize_odds, RawOddsRecord};
use oddsfeed_rust_core::{FeedError, MatchStore, SessionConfig, Sport};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Fixed delay before reconnecting a failed or closed stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Maximum age of the END-frame cursor before it is considered stale.
const MAX_CURSOR_AGE_SECS: i64 = 300;

/// Raw frames buffered between the byte loop and the decode worker.
const FRAME_QUEUE_CAPACITY: usize = 256;

/// Event type of the only continuous-phase frames we decode.
const LIVE_EVENT: &str = "LIVE";

/// Pick the continuous-phase resume cursor from the bootstrap END frame.
///
/// A cursor older than [`MAX_CURSOR_AGE_SECS`] would replay from a point
/// the upstream may no longer serve; substitute the current time.
pub fn resume_cursor(end_ts: i64, now: i64) -> i64 {
    if now - end_ts > MAX_CURSOR_AGE_SECS {
        now
    } else {
        end_ts
    }
}

pub struct StreamIngestion {
    pub api: Arc<PushFeedClient>,
    pub store: MatchStore,
    pub session: Arc<RwLock<SessionConfig>>,
    pub state: Arc<RwLock<CollectorState>>,
    pub running: Arc<std::sync::atomic::AtomicBool>,
    pub counters: Arc<IngestCounters>,
    pub sport: Sport,
}

impl StreamIngestion {
    pub async fn run(self) {
        // Bootstrap, retrying until it lands or the session ends
        let cursor = loop {
            if !self.is_running() {
                return;
            }
            match self.bootstrap().await {
                Ok(cursor) => break cursor,
                Err(e) => {
                    warn!("Bootstrap stream failed: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        };

        *self.state.write().await = CollectorState::Active;
        info!(
            "Bootstrap complete, {} matches in store, resuming live stream from {}",
            self.store.len().await,
            cursor
        );

        // Continuous phase; the stored cursor only survives the first
        // connection, reconnects start from a fresh timestamp.
        let mut next_cursor = Some(cursor);
        loop {
            if !self.is_running() {
                return;
            }
            let since = next_cursor.take().unwrap_or_else(|| Utc::now().timestamp());
            match self.continuous(since).await {
                Ok(()) => info!("Live stream closed by upstream"),
                Err(e) => warn!("Live stream error: {}", e),
            }
            if !self.is_running() {
                return;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn merge_context(&self) -> MergeContext {
        MergeContext {
            store: self.store.clone(),
            session: self.session.clone(),
            counters: self.counters.clone(),
            sport: self.sport,
        }
    }

    /// Consume the bootstrap stream to completion and merge the
    /// accumulated records. Returns the continuous-phase resume cursor.
    async fn bootstrap(&self) -> Result<i64, FeedError> {
        let resp = self.api.open_bootstrap_stream().await?;
        let mut stream = resp.bytes_stream();
        let mut frames = FrameBuffer::new();
        let mut payload = PushPayload::default();
        let mut end_ts = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FeedError::upstream)?;
            for raw in frames.push(&chunk) {
                match parse_frame(&raw) {
                    Some(StreamFrame::End { timestamp }) => end_ts = Some(timestamp),
                    Some(StreamFrame::Payload { data, .. }) => {
                        match serde_json::from_str::<PushPayload>(&data) {
                            Ok(p) => {
                                payload.headers.extend(p.headers);
                                payload.odds.extend(p.odds);
                            }
                            Err(e) => warn!("Dropping malformed bootstrap frame: {}", e),
                        }
                    }
                    None => {}
                }
            }
        }

        self.merge_context().apply_payload(payload).await;

        let now = Utc::now().timestamp();
        Ok(resume_cursor(end_ts.unwrap_or(now), now))
    }

    /// Follow the live stream until it errors or the upstream closes it.
    async fn continuous(&self, since: i64) -> Result<(), FeedError> {
        let resp = self.api.open_live_stream(since).await?;
        debug!("Live stream open (since={})", since);

        let (tx, mut rx) = mpsc::channel::<String>(FRAME_QUEUE_CAPACITY);
        let ctx = self.merge_context();
        let worker = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                let Some(StreamFrame::Payload { event, data }) = parse_frame(&raw) else {
                    continue;
                };
                if event.as_deref() != Some(LIVE_EVENT) {
                    continue;
                }
                match serde_json::from_str::<PushPayload>(&data) {
                    Ok(payload) => ctx.apply_payload(payload).await,
                    Err(e) => warn!("Dropping malformed live frame: {}", e),
                }
            }
        });

        let mut stream = resp.bytes_stream();
        let mut frames = FrameBuffer::new();
        let result = loop {
            if !self.is_running() {
                break Ok(());
            }
            match stream.next().await {
                Some(Ok(chunk)) => {
                    for raw in frames.push(&chunk) {
                        if tx.send(raw).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Err(e)) => break Err(FeedError::upstream(e)),
                None => break Ok(()),
            }
        };

        drop(tx);
        let _ = worker.await;
        result
    }
}

/// The handles a decode worker needs to merge one payload.
#[derive(Clone)]
struct MergeContext {
    store: MatchStore,
    session: Arc<RwLock<SessionConfig>>,
    counters: Arc<IngestCounters>,
    sport: Sport,
}

impl MergeContext {
    async fn apply_payload(&self, payload: PushPayload) {
        if payload.headers.is_empty() && payload.odds.is_empty() {
            return;
        }

        let mut by_match = group_by_match(payload.odds);

        for header in payload.headers {
            let records = by_match.remove(&header.id).unwrap_or_default();
            let normalized = normalize_odds(self.sport, &records);
            self.counters
                .unrecognized_markets
                .fetch_add(normalized.unrecognized as u64, Ordering::Relaxed);
            self.store
                .upsert(header.into_match(self.sport, normalized.odds))
                .await;
        }

        // Bets whose header was sent earlier: merge into the known match,
        // drop the rest until its header shows up.
        for (id, records) in by_match {
            let normalized = normalize_odds(self.sport, &records);
            self.counters
                .unrecognized_markets
                .fetch_add(normalized.unrecognized as u64, Ordering::Relaxed);
            if !normalized.odds.is_empty() && !self.store.merge_match_odds(id, normalized.odds).await
            {
                debug!("Dropping odds for unknown match {}", id);
            }
        }

        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.session.write().await.last_processed_time = Utc::now().timestamp_millis();
    }
}

fn group_by_match(bets: Vec<PushCodedBet>) -> HashMap<i64, Vec<RawOddsRecord>> {
    let mut by_match: HashMap<i64, Vec<RawOddsRecord>> = HashMap::new();
    for bet in bets {
        by_match
            .entry(bet.match_id)
            .or_default()
            .push(RawOddsRecord::Coded {
                om: bet.om,
                pick_code: bet.bpc,
                value: bet.value,
                special_value: bet.special_value,
            });
    }
    by_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::push_api::PushMatchHeader;
    use oddsfeed_rust_core::MarketOdds;

    #[test]
    fn test_resume_cursor_stale_timestamp_replaced() {
        let now = 1_712_345_678;
        assert_eq!(resume_cursor(now - 400, now), now);
        assert_eq!(resume_cursor(now - 301, now), now);
    }

    #[test]
    fn test_resume_cursor_fresh_timestamp_kept() {
        let now = 1_712_345_678;
        assert_eq!(resume_cursor(now - 100, now), now - 100);
        assert_eq!(resume_cursor(now - 300, now), now - 300);
        assert_eq!(resume_cursor(now, now), now);
    }

    fn context() -> MergeContext {
        MergeContext {
            store: MatchStore::new(),
            session: Arc::new(RwLock::new(SessionConfig::default())),
            counters: Arc::new(IngestCounters::default()),
            sport: Sport::Football,
        }
    }

    fn header(id: i64) -> PushMatchHeader {
        PushMatchHeader {
            id,
            match_code: format!("MC{}", id),
            home: "Home FC".to_string(),
            away: "Away FC".to_string(),
            league_name: "Premier League".to_string(),
            league_short_name: "PL".to_string(),
            kick_off_time: 1_700_000_000_000,
            status: "active".to_string(),
            live: true,
            playable: true,
            top: false,
            last_change: 1,
        }
    }

    fn bet(match_id: i64, om: u32, value: f64) -> PushCodedBet {
        PushCodedBet {
            match_id,
            om,
            bpc: om as i64,
            value,
            special_value: None,
        }
    }

    #[tokio::test]
    async fn test_apply_payload_stores_normalized_matches() {
        let ctx = context();
        let payload = PushPayload {
            headers: vec![header(1)],
            odds: vec![bet(1, 1, 1.85), bet(1, 99999, 9.99)],
        };
        ctx.apply_payload(payload).await;

        let stored = ctx.store.get(1).await.unwrap();
        assert!(matches!(
            stored.odds.get("fullTimeResultHomeWin"),
            Some(MarketOdds::Single(q)) if q.value == 1.85
        ));
        assert_eq!(
            ctx.counters.unrecognized_markets.load(Ordering::Relaxed),
            1
        );
        assert!(ctx.session.read().await.last_processed_time > 0);
    }

    #[tokio::test]
    async fn test_apply_payload_merges_headerless_bets_into_known_match() {
        let ctx = context();
        ctx.apply_payload(PushPayload {
            headers: vec![header(5)],
            odds: vec![],
        })
        .await;

        // Later frame: odds only, no header repeated
        ctx.apply_payload(PushPayload {
            headers: vec![],
            odds: vec![bet(5, 2, 3.40)],
        })
        .await;

        let stored = ctx.store.get(5).await.unwrap();
        assert!(stored.odds.contains_key("fullTimeResultDraw"));
    }

    #[tokio::test]
    async fn test_apply_payload_drops_bets_for_unknown_match() {
        let ctx = context();
        ctx.apply_payload(PushPayload {
            headers: vec![],
            odds: vec![bet(404, 1, 2.0)],
        })
        .await;
        assert!(ctx.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_match_with_no_recognized_markets_is_still_stored() {
        let ctx = context();
        ctx.apply_payload(PushPayload {
            headers: vec![header(9)],
            odds: vec![bet(9, 99999, 1.5)],
        })
        .await;
        let stored = ctx.store.get(9).await.unwrap();
        assert!(!stored.has_odds());
    }
}
