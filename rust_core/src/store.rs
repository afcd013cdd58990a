//! In-memory match store.
//!
//! One store per collector session. All mutations funnel through the write
//! lock, which is the single-writer boundary shared with the save timer;
//! concurrent detail fetches may run in parallel but serialize here.

use crate::types::{HeaderPatch, Match, MarketOdds, OddsQuote, OddsSet, Sport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cheap-to-clone handle over the session's match map.
#[derive(Clone, Default)]
pub struct MatchStore {
    inner: Arc<RwLock<HashMap<i64, Match>>>,
}

/// Derived counts reported by the status endpoint.
#[derive(Clone, Debug, Default)]
pub struct StoreCounts {
    pub total: usize,
    pub with_odds: usize,
    pub per_sport: HashMap<Sport, usize>,
    pub leagues: usize,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new match or merge into the existing record.
    ///
    /// Header fields are refreshed in place, the last-change time never
    /// moves backwards, and the incoming odds merge additively into the
    /// stored set.
    pub async fn upsert(&self, incoming: Match) {
        let mut map = self.inner.write().await;
        match map.get_mut(&incoming.id) {
            Some(existing) => {
                existing.match_code = incoming.match_code;
                existing.home = incoming.home;
                existing.away = incoming.away;
                existing.league = incoming.league;
                existing.league_short = incoming.league_short;
                existing.kick_off_time = incoming.kick_off_time;
                existing.status = incoming.status;
                existing.is_live = incoming.is_live;
                existing.blocked = incoming.blocked;
                existing.favourite = incoming.favourite;
                existing.last_change_time =
                    existing.last_change_time.max(incoming.last_change_time);
                merge_odds(&mut existing.odds, incoming.odds);
            }
            None => {
                map.insert(incoming.id, incoming);
            }
        }
    }

    /// Header-only refresh from a delta event change.
    ///
    /// Returns false when the match is not in the store.
    pub async fn patch_header(&self, id: i64, patch: HeaderPatch) -> bool {
        let mut map = self.inner.write().await;
        let Some(existing) = map.get_mut(&id) else {
            return false;
        };
        if let Some(v) = patch.match_code {
            existing.match_code = v;
        }
        if let Some(v) = patch.home {
            existing.home = v;
        }
        if let Some(v) = patch.away {
            existing.away = v;
        }
        if let Some(v) = patch.league {
            existing.league = v;
        }
        if let Some(v) = patch.league_short {
            existing.league_short = v;
        }
        if let Some(v) = patch.kick_off_time {
            existing.kick_off_time = v;
        }
        if let Some(v) = patch.status {
            existing.status = v;
        }
        if let Some(v) = patch.is_live {
            existing.is_live = v;
        }
        if let Some(v) = patch.blocked {
            existing.blocked = v;
        }
        if let Some(v) = patch.last_change_time {
            existing.last_change_time = existing.last_change_time.max(v);
        }
        true
    }

    /// Merge a freshly normalized odds set into an already-known match.
    ///
    /// Returns false when the match is not in the store; odds without a
    /// header are dropped by the callers until the header arrives.
    pub async fn merge_match_odds(&self, id: i64, odds: OddsSet) -> bool {
        let mut map = self.inner.write().await;
        let Some(existing) = map.get_mut(&id) else {
            return false;
        };
        merge_odds(&mut existing.odds, odds);
        true
    }

    /// Single-outcome update from a delta odds change.
    ///
    /// Returns false when the match is not in the store.
    pub async fn apply_quote(
        &self,
        id: i64,
        key: &str,
        line: Option<String>,
        quote: OddsQuote,
    ) -> bool {
        let mut map = self.inner.write().await;
        let Some(existing) = map.get_mut(&id) else {
            return false;
        };
        crate::normalize::insert_quote(&mut existing.odds, key, line, quote);
        true
    }

    pub async fn get(&self, id: i64) -> Option<Match> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Frozen snapshot copy of every match, safe to persist while ingestion
    /// keeps writing.
    pub async fn all(&self) -> Vec<Match> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn counts(&self) -> StoreCounts {
        let map = self.inner.read().await;
        let mut counts = StoreCounts {
            total: map.len(),
            ..Default::default()
        };
        let mut leagues = std::collections::HashSet::new();
        for m in map.values() {
            if m.has_odds() {
                counts.with_odds += 1;
            }
            *counts.per_sport.entry(m.sport).or_insert(0) += 1;
            if !m.league_label().is_empty() {
                leagues.insert(m.league_label().to_string());
            }
        }
        counts.leagues = leagues.len();
        counts
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// Merge `incoming` into `existing` key by key.
///
/// New canonical keys add; line sub-keys add under existing keys; a
/// re-supplied exact key (or exact line sub-key) overwrites its quote.
/// Nothing is ever removed.
pub fn merge_odds(existing: &mut OddsSet, incoming: OddsSet) {
    for (key, value) in incoming {
        let merged = match (existing.remove(&key), value) {
            (Some(MarketOdds::Lines(mut current)), MarketOdds::Lines(new_lines)) => {
                current.extend(new_lines);
                MarketOdds::Lines(current)
            }
            (_, value) => value,
        };
        existing.insert(key, merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OddsQuote;

    fn quote(value: f64, pick_code: i64) -> OddsQuote {
        OddsQuote { value, pick_code }
    }

    fn lines(entries: &[(&str, f64)]) -> MarketOdds {
        MarketOdds::Lines(
            entries
                .iter()
                .map(|(line, v)| (line.to_string(), quote(*v, 0)))
                .collect(),
        )
    }

    fn sample_match(id: i64, odds: OddsSet) -> Match {
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
            last_change_time: 10,
            odds,
        }
    }

    #[test]
    fn test_merge_adds_new_keys() {
        let mut existing = OddsSet::new();
        existing.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(quote(1.85, 1)),
        );

        let mut incoming = OddsSet::new();
        incoming.insert(
            "fullTimeResultDraw".to_string(),
            MarketOdds::Single(quote(3.40, 2)),
        );
        merge_odds(&mut existing, incoming);

        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut base = OddsSet::new();
        base.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(quote(1.85, 1)),
        );
        base.insert("totalGoalsOver".to_string(), lines(&[("2.5", 1.92)]));

        let mut merged = base.clone();
        merge_odds(&mut merged, base.clone());
        merge_odds(&mut merged, base.clone());

        assert_eq!(merged, base);
    }

    #[test]
    fn test_merge_never_deletes_existing_lines() {
        let mut existing = OddsSet::new();
        existing.insert(
            "totalGoalsOver".to_string(),
            lines(&[("2.5", 1.92), ("3.5", 2.60)]),
        );

        let mut incoming = OddsSet::new();
        incoming.insert("totalGoalsOver".to_string(), lines(&[("0.5", 1.10)]));
        merge_odds(&mut existing, incoming);

        match &existing["totalGoalsOver"] {
            MarketOdds::Lines(l) => {
                assert_eq!(l.len(), 3);
                assert_eq!(l["2.5"].value, 1.92);
            }
            other => panic!("expected lines, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_overwrites_resupplied_exact_key() {
        let mut existing = OddsSet::new();
        existing.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(quote(1.85, 1)),
        );
        existing.insert("totalGoalsOver".to_string(), lines(&[("2.5", 1.92)]));

        let mut incoming = OddsSet::new();
        incoming.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(quote(1.70, 1)),
        );
        incoming.insert("totalGoalsOver".to_string(), lines(&[("2.5", 2.05)]));
        merge_odds(&mut existing, incoming);

        assert_eq!(
            existing["fullTimeResultHomeWin"],
            MarketOdds::Single(quote(1.70, 1))
        );
        match &existing["totalGoalsOver"] {
            MarketOdds::Lines(l) => assert_eq!(l["2.5"].value, 2.05),
            other => panic!("expected lines, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_merges() {
        let store = MatchStore::new();

        let mut odds = OddsSet::new();
        odds.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(quote(1.85, 1)),
        );
        store.upsert(sample_match(42, odds)).await;
        assert_eq!(store.len().await, 1);

        let mut update = sample_match(42, OddsSet::new());
        update.status = "halftime".to_string();
        update.last_change_time = 20;
        update.odds.insert(
            "fullTimeResultDraw".to_string(),
            MarketOdds::Single(quote(3.40, 2)),
        );
        store.upsert(update).await;

        let merged = store.get(42).await.unwrap();
        assert_eq!(merged.status, "halftime");
        assert_eq!(merged.last_change_time, 20);
        assert_eq!(merged.odds.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_last_change_time_is_monotonic() {
        let store = MatchStore::new();
        store.upsert(sample_match(1, OddsSet::new())).await;

        let mut stale = sample_match(1, OddsSet::new());
        stale.last_change_time = 3;
        store.upsert(stale).await;

        assert_eq!(store.get(1).await.unwrap().last_change_time, 10);
    }

    #[tokio::test]
    async fn test_apply_quote_requires_known_match() {
        let store = MatchStore::new();
        assert!(
            !store
                .apply_quote(7, "fullTimeResultDraw", None, quote(3.1, 2))
                .await
        );

        store.upsert(sample_match(7, OddsSet::new())).await;
        assert!(
            store
                .apply_quote(7, "fullTimeResultDraw", None, quote(3.1, 2))
                .await
        );
        assert!(store.get(7).await.unwrap().has_odds());
    }

    #[tokio::test]
    async fn test_counts_and_clear() {
        let store = MatchStore::new();
        let mut odds = OddsSet::new();
        odds.insert(
            "matchWinnerHome".to_string(),
            MarketOdds::Single(quote(1.5, 1)),
        );
        let mut tennis = sample_match(1, odds);
        tennis.sport = Sport::Tennis;
        store.upsert(tennis).await;
        store.upsert(sample_match(2, OddsSet::new())).await;

        let counts = store.counts().await;
        assert_eq!(counts.total, 2);
        assert_eq!(counts.with_odds, 1);
        assert_eq!(counts.per_sport[&Sport::Tennis], 1);
        assert_eq!(counts.per_sport[&Sport::Football], 1);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
