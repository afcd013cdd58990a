//! Canonical market tables for all supported sports.
//!
//! This module provides:
//! - The closed enumeration of canonical market keys per sport
//! - Static mapping tables for both upstream encodings (numeric codes and
//!   bet-type/outcome names)
//! - OnceLock-backed hash indexes built once from the static tables
//!
//! The football table carries the union of both upstream variants; markets a
//! given provider never sends simply stay unmapped on that path.

use crate::types::Sport;
use std::collections::HashMap;
use std::sync::OnceLock;

/// How the canonical sub-key is derived for a market.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Plain market, single quote per key
    None,
    /// Totals market, line taken from the special value ("total=2.5" or "2.5")
    Total,
    /// Handicap market, line taken from the special value
    Handicap,
}

/// Canonical destination of one provider market/outcome.
#[derive(Clone, Copy, Debug)]
pub struct MarketTarget {
    /// Canonical market key (e.g. "fullTimeResultDraw")
    pub key: &'static str,
    pub line: LineKind,
}

/// Mapping entry for the numeric push-provider encoding.
pub struct CodedMarket {
    pub sport: Sport,
    /// Provider bet pick code ("om")
    pub om: u32,
    pub target: MarketTarget,
}

/// Mapping entry for the named delta-provider encoding.
pub struct NamedMarket {
    pub sport: Sport,
    /// Provider bet type name, matched case-insensitively
    pub bet_type: &'static str,
    /// Provider outcome name, matched case-insensitively
    pub outcome: &'static str,
    pub target: MarketTarget,
}

const fn plain(key: &'static str) -> MarketTarget {
    MarketTarget {
        key,
        line: LineKind::None,
    }
}

const fn total(key: &'static str) -> MarketTarget {
    MarketTarget {
        key,
        line: LineKind::Total,
    }
}

const fn handicap(key: &'static str) -> MarketTarget {
    MarketTarget {
        key,
        line: LineKind::Handicap,
    }
}

/// Numeric pick codes of the push provider.
pub static CODED_MARKETS: &[CodedMarket] = &[
    // Football - full time result
    CodedMarket { sport: Sport::Football, om: 1, target: plain("fullTimeResultHomeWin") },
    CodedMarket { sport: Sport::Football, om: 2, target: plain("fullTimeResultDraw") },
    CodedMarket { sport: Sport::Football, om: 3, target: plain("fullTimeResultAwayWin") },
    // Football - double chance
    CodedMarket { sport: Sport::Football, om: 4, target: plain("doubleChance1X") },
    CodedMarket { sport: Sport::Football, om: 5, target: plain("doubleChance12") },
    CodedMarket { sport: Sport::Football, om: 6, target: plain("doubleChanceX2") },
    // Football - half results
    CodedMarket { sport: Sport::Football, om: 7, target: plain("firstHalfResultHomeWin") },
    CodedMarket { sport: Sport::Football, om: 8, target: plain("firstHalfResultDraw") },
    CodedMarket { sport: Sport::Football, om: 9, target: plain("firstHalfResultAwayWin") },
    CodedMarket { sport: Sport::Football, om: 10, target: plain("secondHalfResultHomeWin") },
    CodedMarket { sport: Sport::Football, om: 11, target: plain("secondHalfResultDraw") },
    CodedMarket { sport: Sport::Football, om: 12, target: plain("secondHalfResultAwayWin") },
    // Football - both teams to score / draw no bet
    CodedMarket { sport: Sport::Football, om: 272, target: plain("bothTeamsToScoreYes") },
    CodedMarket { sport: Sport::Football, om: 273, target: plain("bothTeamsToScoreNo") },
    CodedMarket { sport: Sport::Football, om: 380, target: plain("drawNoBetHome") },
    CodedMarket { sport: Sport::Football, om: 381, target: plain("drawNoBetAway") },
    // Football - totals and handicaps
    CodedMarket { sport: Sport::Football, om: 242, target: total("totalGoalsOver") },
    CodedMarket { sport: Sport::Football, om: 244, target: total("totalGoalsUnder") },
    CodedMarket { sport: Sport::Football, om: 247, target: total("firstHalfTotalOver") },
    CodedMarket { sport: Sport::Football, om: 248, target: total("firstHalfTotalUnder") },
    CodedMarket { sport: Sport::Football, om: 731, target: handicap("handicapHome") },
    CodedMarket { sport: Sport::Football, om: 732, target: handicap("handicapAway") },
    // Basketball - winner incl. overtime
    CodedMarket { sport: Sport::Basketball, om: 50451, target: plain("basketballFTOT1") },
    CodedMarket { sport: Sport::Basketball, om: 50452, target: plain("basketballFTOT2") },
    // Tennis
    CodedMarket { sport: Sport::Tennis, om: 1, target: plain("matchWinnerHome") },
    CodedMarket { sport: Sport::Tennis, om: 2, target: plain("matchWinnerAway") },
    CodedMarket { sport: Sport::Tennis, om: 70, target: plain("firstSetWinnerHome") },
    CodedMarket { sport: Sport::Tennis, om: 71, target: plain("firstSetWinnerAway") },
    CodedMarket { sport: Sport::Tennis, om: 80, target: total("totalGamesOver") },
    CodedMarket { sport: Sport::Tennis, om: 81, target: total("totalGamesUnder") },
];

/// Bet type / outcome names of the delta provider.
pub static NAMED_MARKETS: &[NamedMarket] = &[
    // Football - full time result
    NamedMarket { sport: Sport::Football, bet_type: "Full Time Result", outcome: "1", target: plain("fullTimeResultHomeWin") },
    NamedMarket { sport: Sport::Football, bet_type: "Full Time Result", outcome: "X", target: plain("fullTimeResultDraw") },
    NamedMarket { sport: Sport::Football, bet_type: "Full Time Result", outcome: "2", target: plain("fullTimeResultAwayWin") },
    // Football - double chance
    NamedMarket { sport: Sport::Football, bet_type: "Double Chance", outcome: "1X", target: plain("doubleChance1X") },
    NamedMarket { sport: Sport::Football, bet_type: "Double Chance", outcome: "12", target: plain("doubleChance12") },
    NamedMarket { sport: Sport::Football, bet_type: "Double Chance", outcome: "X2", target: plain("doubleChanceX2") },
    // Football - half results
    NamedMarket { sport: Sport::Football, bet_type: "First Half Result", outcome: "1", target: plain("firstHalfResultHomeWin") },
    NamedMarket { sport: Sport::Football, bet_type: "First Half Result", outcome: "X", target: plain("firstHalfResultDraw") },
    NamedMarket { sport: Sport::Football, bet_type: "First Half Result", outcome: "2", target: plain("firstHalfResultAwayWin") },
    NamedMarket { sport: Sport::Football, bet_type: "Second Half Result", outcome: "1", target: plain("secondHalfResultHomeWin") },
    NamedMarket { sport: Sport::Football, bet_type: "Second Half Result", outcome: "X", target: plain("secondHalfResultDraw") },
    NamedMarket { sport: Sport::Football, bet_type: "Second Half Result", outcome: "2", target: plain("secondHalfResultAwayWin") },
    // Football - both teams to score / draw no bet
    NamedMarket { sport: Sport::Football, bet_type: "Both Teams To Score", outcome: "Yes", target: plain("bothTeamsToScoreYes") },
    NamedMarket { sport: Sport::Football, bet_type: "Both Teams To Score", outcome: "No", target: plain("bothTeamsToScoreNo") },
    NamedMarket { sport: Sport::Football, bet_type: "Draw No Bet", outcome: "1", target: plain("drawNoBetHome") },
    NamedMarket { sport: Sport::Football, bet_type: "Draw No Bet", outcome: "2", target: plain("drawNoBetAway") },
    // Football - totals and handicaps
    NamedMarket { sport: Sport::Football, bet_type: "Total Goals", outcome: "Over", target: total("totalGoalsOver") },
    NamedMarket { sport: Sport::Football, bet_type: "Total Goals", outcome: "Under", target: total("totalGoalsUnder") },
    NamedMarket { sport: Sport::Football, bet_type: "First Half Total Goals", outcome: "Over", target: total("firstHalfTotalOver") },
    NamedMarket { sport: Sport::Football, bet_type: "First Half Total Goals", outcome: "Under", target: total("firstHalfTotalUnder") },
    NamedMarket { sport: Sport::Football, bet_type: "Handicap", outcome: "1", target: handicap("handicapHome") },
    NamedMarket { sport: Sport::Football, bet_type: "Handicap", outcome: "2", target: handicap("handicapAway") },
    // Football - goal ranges (delta provider only)
    NamedMarket { sport: Sport::Football, bet_type: "Goal Range", outcome: "0-1", target: plain("goalRangeZeroToOne") },
    NamedMarket { sport: Sport::Football, bet_type: "Goal Range", outcome: "2-3", target: plain("goalRangeTwoToThree") },
    NamedMarket { sport: Sport::Football, bet_type: "Goal Range", outcome: "4+", target: plain("goalRangeFourPlus") },
    // Basketball - winner incl. overtime
    NamedMarket { sport: Sport::Basketball, bet_type: "Winner Incl. Overtime", outcome: "1", target: plain("basketballFTOT1") },
    NamedMarket { sport: Sport::Basketball, bet_type: "Winner Incl. Overtime", outcome: "2", target: plain("basketballFTOT2") },
    // Tennis
    NamedMarket { sport: Sport::Tennis, bet_type: "Match Winner", outcome: "1", target: plain("matchWinnerHome") },
    NamedMarket { sport: Sport::Tennis, bet_type: "Match Winner", outcome: "2", target: plain("matchWinnerAway") },
    NamedMarket { sport: Sport::Tennis, bet_type: "First Set Winner", outcome: "1", target: plain("firstSetWinnerHome") },
    NamedMarket { sport: Sport::Tennis, bet_type: "First Set Winner", outcome: "2", target: plain("firstSetWinnerAway") },
    NamedMarket { sport: Sport::Tennis, bet_type: "Total Games", outcome: "Over", target: total("totalGamesOver") },
    NamedMarket { sport: Sport::Tennis, bet_type: "Total Games", outcome: "Under", target: total("totalGamesUnder") },
];

static CODED_INDEX: OnceLock<HashMap<(Sport, u32), &'static MarketTarget>> = OnceLock::new();
static NAMED_INDEX: OnceLock<HashMap<(Sport, String, String), &'static MarketTarget>> =
    OnceLock::new();

/// Look up the canonical target for a numeric push-provider code.
pub fn resolve_coded(sport: Sport, om: u32) -> Option<&'static MarketTarget> {
    let index = CODED_INDEX.get_or_init(|| {
        CODED_MARKETS
            .iter()
            .map(|m| ((m.sport, m.om), &m.target))
            .collect()
    });
    index.get(&(sport, om)).copied()
}

/// Look up the canonical target for a delta-provider bet type/outcome pair.
pub fn resolve_named(sport: Sport, bet_type: &str, outcome: &str) -> Option<&'static MarketTarget> {
    let index = NAMED_INDEX.get_or_init(|| {
        NAMED_MARKETS
            .iter()
            .map(|m| {
                (
                    (m.sport, m.bet_type.to_lowercase(), m.outcome.to_lowercase()),
                    &m.target,
                )
            })
            .collect()
    });
    index
        .get(&(sport, bet_type.to_lowercase(), outcome.to_lowercase()))
        .copied()
}
