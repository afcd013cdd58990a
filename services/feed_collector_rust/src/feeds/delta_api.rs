//! Delta provider client and wire format.
//!
//! Three request/response endpoints: the paginated event catalog, per-event
//! detailed odds, and the incremental "changes since token" endpoint. The
//! changes endpoint returns compact positional arrays; the field indices are
//! a contract with the upstream and are decoded explicitly with
//! minimum-length validation, never inline.

use oddsfeed_rust_core::normalize::RawOddsRecord;
use oddsfeed_rust_core::{FeedError, HeaderPatch, Match, OddsSet, Sport};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

/// Request/response timeout for all delta endpoints.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DeltaFeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl DeltaFeedClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Fetch one catalog page. `skip` is an item offset, not a page index.
    pub async fn fetch_catalog_page(
        &self,
        sport: Sport,
        page_size: usize,
        skip: usize,
        date_from: i64,
        date_to: i64,
    ) -> Result<Vec<CatalogEvent>, FeedError> {
        let url = format!(
            "{}/events?sportId={}&pageSize={}&skip={}&dateFrom={}&dateTo={}",
            self.base_url,
            sport.upstream_id(),
            page_size,
            skip,
            date_from,
            date_to
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FeedError::upstream)?;
        if !resp.status().is_success() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "{} -> {}",
                url,
                resp.status()
            )));
        }
        resp.json().await.map_err(FeedError::decode)
    }

    /// Fetch the full odds card for one event.
    pub async fn fetch_event_details(
        &self,
        sport: Sport,
        region_id: i64,
        competition_id: i64,
        event_id: i64,
    ) -> Result<EventDetails, FeedError> {
        let url = format!(
            "{}/sports/{}/regions/{}/competitions/{}/events/{}",
            self.base_url,
            sport.upstream_id(),
            region_id,
            competition_id,
            event_id
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FeedError::upstream)?;
        if !resp.status().is_success() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "{} -> {}",
                url,
                resp.status()
            )));
        }
        resp.json().await.map_err(FeedError::decode)
    }

    /// Fetch everything changed since the given token (`None` on the first
    /// call). Malformed change records are dropped, not fatal.
    pub async fn fetch_changes(&self, token: Option<&str>) -> Result<DeltaChanges, FeedError> {
        let url = format!("{}/changes", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(FeedError::upstream)?;
        if !resp.status().is_success() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "{} -> {}",
                url,
                resp.status()
            )));
        }
        let raw: RawChanges = resp.json().await.map_err(FeedError::decode)?;
        Ok(decode_changes(raw))
    }
}

/// Catalog entry as listed by the events endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEvent {
    pub id: i64,
    pub match_code: String,
    pub home: String,
    pub away: String,
    pub region_id: i64,
    pub competition_id: i64,
    pub competition_name: String,
    pub competition_short_name: String,
    /// Epoch millis
    pub start_time: i64,
    pub status: String,
    pub live: bool,
    pub playable: bool,
    pub top: bool,
}

/// Full odds card for one event.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDetails {
    pub id: i64,
    pub match_code: String,
    pub home: String,
    pub away: String,
    pub competition_name: String,
    pub competition_short_name: String,
    pub start_time: i64,
    pub status: String,
    pub live: bool,
    pub playable: bool,
    pub top: bool,
    /// Epoch millis
    pub last_change: i64,
    pub bets: Vec<NamedBetGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedBetGroup {
    pub bet_type_name: String,
    /// Raw special value shared by the group's outcomes ("total=2.5")
    pub special_value: Option<String>,
    pub outcomes: Vec<NamedOutcome>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedOutcome {
    pub name: String,
    pub value: f64,
    pub pick_code: i64,
}

impl EventDetails {
    /// Flatten the bet groups into raw records for the normalizer.
    pub fn raw_records(&self) -> Vec<RawOddsRecord> {
        let mut records = Vec::new();
        for group in &self.bets {
            for outcome in &group.outcomes {
                records.push(RawOddsRecord::Named {
                    bet_type: group.bet_type_name.clone(),
                    outcome: outcome.name.clone(),
                    pick_code: outcome.pick_code,
                    value: outcome.value,
                    special_value: group.special_value.clone(),
                });
            }
        }
        records
    }

    pub fn into_match(self, sport: Sport, odds: OddsSet) -> Match {
        Match {
            id: self.id,
            match_code: self.match_code,
            home: self.home,
            away: self.away,
            league: self.competition_name,
            league_short: self.competition_short_name,
            sport,
            kick_off_time: self.start_time,
            status: self.status,
            is_live: self.live,
            blocked: !self.playable,
            favourite: self.top,
            last_change_time: self.last_change,
            odds,
        }
    }
}

/// Changes response as it arrives: positional arrays.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChanges {
    token: Option<String>,
    events: Vec<Vec<Value>>,
    odds: Vec<Vec<Value>>,
}

/// Decoded changes response.
#[derive(Debug, Default)]
pub struct DeltaChanges {
    /// Token to echo on the next poll
    pub token: Option<String>,
    pub events: Vec<EventChange>,
    pub odds: Vec<OddsChange>,
}

/// Field indices of the positional event change tuple.
mod event_idx {
    pub const ID: usize = 0;
    pub const MATCH_CODE: usize = 1;
    pub const HOME: usize = 2;
    pub const AWAY: usize = 3;
    pub const LEAGUE: usize = 4;
    pub const LEAGUE_SHORT: usize = 5;
    pub const KICK_OFF: usize = 6;
    pub const STATUS: usize = 7;
    pub const REGION_ID: usize = 8;
    pub const COMPETITION_ID: usize = 9;
    pub const IS_LIVE: usize = 10;
    pub const BLOCKED: usize = 11;
    /// Everything through COMPETITION_ID is mandatory
    pub const MIN_LEN: usize = 10;
}

/// Field indices of the positional odds change tuple.
mod odds_idx {
    pub const EVENT_ID: usize = 0;
    pub const BET_TYPE: usize = 1;
    pub const OUTCOME: usize = 2;
    pub const SPECIAL_VALUE: usize = 3;
    pub const VALUE: usize = 4;
    pub const PICK_CODE: usize = 5;
    pub const MIN_LEN: usize = 6;
}

/// One changed or new event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventChange {
    pub id: i64,
    pub match_code: String,
    pub home: String,
    pub away: String,
    pub league: String,
    pub league_short: String,
    pub kick_off_time: i64,
    pub status: String,
    pub region_id: i64,
    pub competition_id: i64,
    pub is_live: Option<bool>,
    pub blocked: Option<bool>,
}

impl EventChange {
    pub fn into_patch(self) -> HeaderPatch {
        HeaderPatch {
            match_code: Some(self.match_code),
            home: Some(self.home),
            away: Some(self.away),
            league: Some(self.league),
            league_short: Some(self.league_short),
            kick_off_time: Some(self.kick_off_time),
            status: Some(self.status),
            is_live: self.is_live,
            blocked: self.blocked,
            last_change_time: None,
        }
    }
}

/// One changed bet outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsChange {
    pub event_id: i64,
    pub bet_type: String,
    pub outcome: String,
    pub special_value: Option<String>,
    pub value: f64,
    pub pick_code: i64,
}

fn decode_changes(raw: RawChanges) -> DeltaChanges {
    let mut changes = DeltaChanges {
        token: raw.token,
        ..Default::default()
    };
    for record in &raw.events {
        match decode_event_change(record) {
            Ok(ev) => changes.events.push(ev),
            Err(e) => warn!("Dropping malformed event change: {}", e),
        }
    }
    for record in &raw.odds {
        match decode_odds_change(record) {
            Ok(oc) => changes.odds.push(oc),
            Err(e) => warn!("Dropping malformed odds change: {}", e),
        }
    }
    changes
}

pub fn decode_event_change(record: &[Value]) -> Result<EventChange, FeedError> {
    if record.len() < event_idx::MIN_LEN {
        return Err(FeedError::DecodeFailure(format!(
            "event change has {} fields, need {}",
            record.len(),
            event_idx::MIN_LEN
        )));
    }
    Ok(EventChange {
        id: as_i64(record, event_idx::ID)?,
        match_code: as_string(record, event_idx::MATCH_CODE)?,
        home: as_string(record, event_idx::HOME)?,
        away: as_string(record, event_idx::AWAY)?,
        league: as_string(record, event_idx::LEAGUE)?,
        league_short: as_string(record, event_idx::LEAGUE_SHORT)?,
        kick_off_time: as_i64(record, event_idx::KICK_OFF)?,
        status: as_string(record, event_idx::STATUS)?,
        region_id: as_i64(record, event_idx::REGION_ID)?,
        competition_id: as_i64(record, event_idx::COMPETITION_ID)?,
        is_live: record.get(event_idx::IS_LIVE).and_then(Value::as_bool),
        blocked: record.get(event_idx::BLOCKED).and_then(Value::as_bool),
    })
}

pub fn decode_odds_change(record: &[Value]) -> Result<OddsChange, FeedError> {
    if record.len() < odds_idx::MIN_LEN {
        return Err(FeedError::DecodeFailure(format!(
            "odds change has {} fields, need {}",
            record.len(),
            odds_idx::MIN_LEN
        )));
    }
    Ok(OddsChange {
        event_id: as_i64(record, odds_idx::EVENT_ID)?,
        bet_type: as_string(record, odds_idx::BET_TYPE)?,
        outcome: as_string(record, odds_idx::OUTCOME)?,
        special_value: record
            .get(odds_idx::SPECIAL_VALUE)
            .and_then(Value::as_str)
            .map(String::from),
        value: as_f64(record, odds_idx::VALUE)?,
        pick_code: as_i64(record, odds_idx::PICK_CODE)?,
    })
}

fn as_i64(record: &[Value], idx: usize) -> Result<i64, FeedError> {
    record
        .get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| FeedError::DecodeFailure(format!("field {} is not an integer", idx)))
}

fn as_f64(record: &[Value], idx: usize) -> Result<f64, FeedError> {
    record
        .get(idx)
        .and_then(Value::as_f64)
        .ok_or_else(|| FeedError::DecodeFailure(format!("field {} is not a number", idx)))
}

fn as_string(record: &[Value], idx: usize) -> Result<String, FeedError> {
    record
        .get(idx)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| FeedError::DecodeFailure(format!("field {} is not a string", idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_record() -> Vec<Value> {
        serde_json::from_str(
            r#"[42, "MC42", "Home FC", "Away FC", "Premier League", "PL",
                1700000000000, "active", 3, 17, true, false]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_decode_event_change() {
        let ev = decode_event_change(&event_record()).unwrap();
        assert_eq!(ev.id, 42);
        assert_eq!(ev.region_id, 3);
        assert_eq!(ev.competition_id, 17);
        assert_eq!(ev.is_live, Some(true));
        assert_eq!(ev.blocked, Some(false));
    }

    #[test]
    fn test_decode_event_change_without_optional_tail() {
        let mut record = event_record();
        record.truncate(event_idx::MIN_LEN);
        let ev = decode_event_change(&record).unwrap();
        assert_eq!(ev.is_live, None);
        assert_eq!(ev.blocked, None);
    }

    #[test]
    fn test_decode_event_change_rejects_short_record() {
        let mut record = event_record();
        record.truncate(5);
        assert!(decode_event_change(&record).is_err());
    }

    #[test]
    fn test_decode_odds_change() {
        let record: Vec<Value> = serde_json::from_str(
            r#"[42, "Total Goals", "Over", "total=2.5", 1.92, 240]"#,
        )
        .unwrap();
        let oc = decode_odds_change(&record).unwrap();
        assert_eq!(oc.event_id, 42);
        assert_eq!(oc.bet_type, "Total Goals");
        assert_eq!(oc.special_value.as_deref(), Some("total=2.5"));
        assert_eq!(oc.value, 1.92);
    }

    #[test]
    fn test_decode_odds_change_null_special_value() {
        let record: Vec<Value> =
            serde_json::from_str(r#"[42, "Full Time Result", "X", null, 3.4, 2]"#).unwrap();
        let oc = decode_odds_change(&record).unwrap();
        assert_eq!(oc.special_value, None);
    }

    #[test]
    fn test_decode_odds_change_rejects_wrong_type() {
        let record: Vec<Value> =
            serde_json::from_str(r#"["forty-two", "Full Time Result", "X", null, 3.4, 2]"#)
                .unwrap();
        assert!(decode_odds_change(&record).is_err());
    }

    #[test]
    fn test_event_details_flatten_to_raw_records() {
        let json = r#"{
            "id": 42, "matchCode": "MC42", "home": "A", "away": "B",
            "competitionName": "Premier League", "competitionShortName": "PL",
            "startTime": 1700000000000, "status": "active", "live": false,
            "playable": true, "top": true, "lastChange": 9,
            "bets": [
                {"betTypeName": "Full Time Result", "specialValue": null,
                 "outcomes": [{"name": "1", "value": 1.85, "pickCode": 1},
                              {"name": "X", "value": 3.40, "pickCode": 2}]},
                {"betTypeName": "Total Goals", "specialValue": "total=2.5",
                 "outcomes": [{"name": "Over", "value": 1.92, "pickCode": 240}]}
            ]
        }"#;
        let details: EventDetails = serde_json::from_str(json).unwrap();
        let records = details.raw_records();
        assert_eq!(records.len(), 3);
        let m = details.into_match(Sport::Football, OddsSet::new());
        assert_eq!(m.league_short, "PL");
        assert!(m.favourite);
        assert!(!m.blocked);
    }
}
