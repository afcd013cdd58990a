//! Odds normalization.
//!
//! Pure mapping from provider-specific bet records to the canonical
//! `OddsSet` shape. Two upstream families exist with different raw
//! encodings; both resolve through the shared tables in [`markets`], so the
//! bootstrap and delta paths are guaranteed to produce identical canonical
//! keys. Unmapped records are dropped silently and only counted.

pub mod markets;

pub use markets::{resolve_coded, resolve_named, LineKind, MarketTarget};

use crate::types::{MarketOdds, OddsQuote, OddsSet, Sport};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One raw bet record as received from an upstream provider.
#[derive(Clone, Debug)]
pub enum RawOddsRecord {
    /// Push-provider encoding: numeric bet pick code plus raw pick id
    Coded {
        om: u32,
        pick_code: i64,
        value: f64,
        special_value: Option<String>,
    },
    /// Delta-provider encoding: bet type and outcome names
    Named {
        bet_type: String,
        outcome: String,
        pick_code: i64,
        value: f64,
        special_value: Option<String>,
    },
}

/// Result of one normalization pass.
#[derive(Clone, Debug, Default)]
pub struct NormalizedOdds {
    pub odds: OddsSet,
    /// Records with no canonical mapping, kept for observability only
    pub unrecognized: u32,
}

static LINE_RE: OnceLock<Regex> = OnceLock::new();

/// Extract the numeric line from a raw special-value string.
///
/// Accepts the "total=2.5" form used by the delta provider and plain
/// numeric strings ("2.5", "-1.5") used by the push provider.
pub fn extract_line(special: &str) -> Option<f64> {
    let re = LINE_RE.get_or_init(|| Regex::new(r"total=(-?\d+(?:\.\d+)?)").unwrap());
    if let Some(caps) = re.captures(special) {
        return caps.get(1)?.as_str().parse().ok();
    }
    special.trim().parse().ok()
}

/// Canonical fixed-precision sub-key for a line value ("2.5", "-1.0").
pub fn line_key(value: f64) -> String {
    format!("{:.1}", value)
}

/// Normalize raw provider records into a canonical odds set.
pub fn normalize_odds(sport: Sport, records: &[RawOddsRecord]) -> NormalizedOdds {
    let mut out = NormalizedOdds::default();

    for record in records {
        let (target, pick_code, value, special) = match record {
            RawOddsRecord::Coded {
                om,
                pick_code,
                value,
                special_value,
            } => (
                resolve_coded(sport, *om),
                *pick_code,
                *value,
                special_value.as_deref(),
            ),
            RawOddsRecord::Named {
                bet_type,
                outcome,
                pick_code,
                value,
                special_value,
            } => (
                resolve_named(sport, bet_type, outcome),
                *pick_code,
                *value,
                special_value.as_deref(),
            ),
        };

        let Some(target) = target else {
            out.unrecognized += 1;
            continue;
        };

        let quote = OddsQuote { value, pick_code };
        match line_for(target, special) {
            Ok(line) => insert_quote(&mut out.odds, target.key, line, quote),
            Err(()) => out.unrecognized += 1,
        }
    }

    out
}

/// Resolve the line sub-key required by the target, if any.
///
/// Line markets without a parsable special value count as unrecognized.
fn line_for(target: &MarketTarget, special: Option<&str>) -> Result<Option<String>, ()> {
    match target.line {
        LineKind::None => Ok(None),
        LineKind::Total | LineKind::Handicap => special
            .and_then(extract_line)
            .map(|v| Some(line_key(v)))
            .ok_or(()),
    }
}

/// Write one quote into the set, creating or extending line maps as needed.
pub fn insert_quote(set: &mut OddsSet, key: &str, line: Option<String>, quote: OddsQuote) {
    match line {
        None => {
            set.insert(key.to_string(), MarketOdds::Single(quote));
        }
        Some(line) => {
            let entry = set
                .entry(key.to_string())
                .or_insert_with(|| MarketOdds::Lines(HashMap::new()));
            // A key is either plain or line-based for its whole lifetime;
            // reset if the upstream ever flips the shape.
            if !matches!(entry, MarketOdds::Lines(_)) {
                *entry = MarketOdds::Lines(HashMap::new());
            }
            if let MarketOdds::Lines(lines) = entry {
                lines.insert(line, quote);
            }
        }
    }
}
