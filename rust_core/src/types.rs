//! Canonical types shared by the feed collectors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported sports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Football,
    Basketball,
    Tennis,
}

impl Sport {
    pub const ALL: &'static [Sport] = &[Sport::Football, Sport::Basketball, Sport::Tennis];

    /// Parse a sport code as accepted by the control surface
    pub fn parse(code: &str) -> Option<Sport> {
        match code.to_lowercase().as_str() {
            "football" | "soccer" => Some(Sport::Football),
            "basketball" => Some(Sport::Basketball),
            "tennis" => Some(Sport::Tennis),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sport::Football => "football",
            Sport::Basketball => "basketball",
            Sport::Tennis => "tennis",
        }
    }

    /// Numeric sport id used by the delta provider's catalog endpoint
    pub fn upstream_id(&self) -> u32 {
        match self {
            Sport::Football => 1,
            Sport::Basketball => 2,
            Sport::Tennis => 5,
        }
    }
}

/// A single priced outcome, with the upstream pick code preserved
/// for downstream reference.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsQuote {
    pub value: f64,
    pub pick_code: i64,
}

/// Odds for one canonical market key.
///
/// Plain markets (match result, both teams to score, ...) hold a single
/// quote. Line-based markets (totals, handicaps) hold one quote per line,
/// keyed by the fixed-precision line string ("2.5").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketOdds {
    Single(OddsQuote),
    Lines(HashMap<String, OddsQuote>),
}

/// Canonical market key -> odds
pub type OddsSet = HashMap<String, MarketOdds>;

/// Canonical match record maintained by the collector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Upstream event id, stable for the lifetime of one collection session
    pub id: i64,
    /// Upstream alternate id
    #[serde(default)]
    pub match_code: String,
    pub home: String,
    pub away: String,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub league_short: String,
    pub sport: Sport,
    /// Kick-off in epoch millis
    pub kick_off_time: i64,
    /// Provider status code, passed through untouched
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub favourite: bool,
    /// Epoch millis of the last upstream change, monotonically non-decreasing
    #[serde(default)]
    pub last_change_time: i64,
    #[serde(default)]
    pub odds: OddsSet,
}

impl Match {
    /// True when at least one canonical market is populated
    pub fn has_odds(&self) -> bool {
        !self.odds.is_empty()
    }

    /// Distinct league label used for the secondary league index
    pub fn league_label(&self) -> &str {
        if self.league.is_empty() {
            &self.league_short
        } else {
            &self.league
        }
    }
}

/// Header-only refresh applied by the delta poll path.
///
/// Fields past the positional minimum length arrive as `None` and leave
/// the stored value untouched.
#[derive(Clone, Debug, Default)]
pub struct HeaderPatch {
    pub match_code: Option<String>,
    pub home: Option<String>,
    pub away: Option<String>,
    pub league: Option<String>,
    pub league_short: Option<String>,
    pub kick_off_time: Option<i64>,
    pub status: Option<String>,
    pub is_live: Option<bool>,
    pub blocked: Option<bool>,
    pub last_change_time: Option<i64>,
}

/// Secondary league index entry, used only for status reporting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
}

/// Per-session collection settings, owned by the collector.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub is_running: bool,
    pub collection_interval_secs: u64,
    pub selected_sport: Sport,
    /// Opaque cursor echoed to the delta changes endpoint; None before the
    /// first successful poll and always None in push-stream mode
    pub delta_cache_token: Option<String>,
    /// Epoch millis of the last processed payload, 0 = never
    pub last_processed_time: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            is_running: false,
            collection_interval_secs: 0,
            selected_sport: Sport::Football,
            delta_cache_token: None,
            last_processed_time: 0,
        }
    }
}

/// Run metadata persisted next to every snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Epoch millis of the flush
    pub last_updated: i64,
    pub collection_interval: u64,
    pub selected_sport: Sport,
    pub total_matches: usize,
    pub total_leagues: usize,
}
