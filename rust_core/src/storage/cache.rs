//! Redis snapshot backend.
//!
//! Layout: one hash per match under `<prefix>:<id>` with scalar fields
//! stringified and odds JSON-encoded, the id set under `<prefix>:index`,
//! and a metadata hash under `<prefix>:meta`. Everything expires after
//! 24 hours so a dead collector leaves no stale snapshot behind.

use crate::error::FeedError;
use crate::types::{Match, OddsSet, SnapshotMetadata, Sport};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;

/// Snapshot expiry, 24 hours.
const SNAPSHOT_TTL_SECS: i64 = 86_400;

pub struct CacheStorage {
    conn: ConnectionManager,
    prefix: String,
}

impl CacheStorage {
    /// Open a managed connection; fails fast when the cache is unreachable
    /// so the gateway can fall back to file mode.
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, FeedError> {
        let client = redis::Client::open(redis_url).map_err(FeedError::storage)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(FeedError::storage)?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn match_key(&self, id: i64) -> String {
        format!("{}:{}", self.prefix, id)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.prefix)
    }

    fn meta_key(&self) -> String {
        format!("{}:meta", self.prefix)
    }

    pub async fn save(&self, matches: &[Match], meta: &SnapshotMetadata) -> Result<(), FeedError> {
        let mut conn = self.conn.clone();

        for m in matches {
            let key = self.match_key(m.id);
            let odds_json = serde_json::to_string(&m.odds).map_err(FeedError::storage)?;
            let fields = [
                ("id", m.id.to_string()),
                ("matchCode", m.match_code.clone()),
                ("home", m.home.clone()),
                ("away", m.away.clone()),
                ("league", m.league.clone()),
                ("leagueShort", m.league_short.clone()),
                ("sport", m.sport.code().to_string()),
                ("kickOffTime", m.kick_off_time.to_string()),
                ("status", m.status.clone()),
                ("isLive", m.is_live.to_string()),
                ("blocked", m.blocked.to_string()),
                ("favourite", m.favourite.to_string()),
                ("lastChangeTime", m.last_change_time.to_string()),
                ("odds", odds_json),
            ];
            let _: () = conn
                .hset_multiple(&key, &fields)
                .await
                .map_err(FeedError::storage)?;
            let _: () = conn
                .expire(&key, SNAPSHOT_TTL_SECS)
                .await
                .map_err(FeedError::storage)?;
            let _: () = conn
                .sadd(self.index_key(), m.id)
                .await
                .map_err(FeedError::storage)?;
        }

        let meta_fields = [
            ("lastUpdated", meta.last_updated.to_string()),
            ("collectionInterval", meta.collection_interval.to_string()),
            ("selectedSport", meta.selected_sport.code().to_string()),
            ("totalMatches", meta.total_matches.to_string()),
            ("totalLeagues", meta.total_leagues.to_string()),
        ];
        let _: () = conn
            .hset_multiple(self.meta_key(), &meta_fields)
            .await
            .map_err(FeedError::storage)?;
        let _: () = conn
            .expire(self.meta_key(), SNAPSHOT_TTL_SECS)
            .await
            .map_err(FeedError::storage)?;
        let _: () = conn
            .expire(self.index_key(), SNAPSHOT_TTL_SECS)
            .await
            .map_err(FeedError::storage)?;

        debug!("Saved {} matches to cache store", matches.len());
        Ok(())
    }

    pub async fn load(&self) -> Result<Vec<Match>, FeedError> {
        let mut conn = self.conn.clone();
        let ids: Vec<i64> = conn
            .smembers(self.index_key())
            .await
            .map_err(FeedError::storage)?;

        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            let fields: HashMap<String, String> = conn
                .hgetall(self.match_key(id))
                .await
                .map_err(FeedError::storage)?;
            if fields.is_empty() {
                // Entry expired out from under the index set
                continue;
            }
            matches.push(decode_match(&fields)?);
        }
        Ok(matches)
    }

    pub async fn clear(&self) -> Result<(), FeedError> {
        let mut conn = self.conn.clone();
        let ids: Vec<i64> = conn
            .smembers(self.index_key())
            .await
            .map_err(FeedError::storage)?;
        for id in ids {
            let _: () = conn
                .del(self.match_key(id))
                .await
                .map_err(FeedError::storage)?;
        }
        let _: () = conn
            .del(self.index_key())
            .await
            .map_err(FeedError::storage)?;
        let _: () = conn
            .del(self.meta_key())
            .await
            .map_err(FeedError::storage)?;
        Ok(())
    }

    /// Cheap connectivity probe for status reporting.
    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, FeedError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| FeedError::storage(format!("cache entry missing field {}", name)))
}

fn parse_i64(fields: &HashMap<String, String>, name: &str) -> Result<i64, FeedError> {
    field(fields, name)?.parse().map_err(FeedError::storage)
}

fn parse_bool(fields: &HashMap<String, String>, name: &str) -> Result<bool, FeedError> {
    field(fields, name)?.parse().map_err(FeedError::storage)
}

fn decode_match(fields: &HashMap<String, String>) -> Result<Match, FeedError> {
    let sport_code = field(fields, "sport")?;
    let sport = Sport::parse(sport_code)
        .ok_or_else(|| FeedError::storage(format!("unknown sport code {}", sport_code)))?;
    let odds: OddsSet = serde_json::from_str(field(fields, "odds")?).map_err(FeedError::storage)?;

    Ok(Match {
        id: parse_i64(fields, "id")?,
        match_code: field(fields, "matchCode")?.to_string(),
        home: field(fields, "home")?.to_string(),
        away: field(fields, "away")?.to_string(),
        league: field(fields, "league")?.to_string(),
        league_short: field(fields, "leagueShort")?.to_string(),
        sport,
        kick_off_time: parse_i64(fields, "kickOffTime")?,
        status: field(fields, "status")?.to_string(),
        is_live: parse_bool(fields, "isLive")?,
        blocked: parse_bool(fields, "blocked")?,
        favourite: parse_bool(fields, "favourite")?,
        last_change_time: parse_i64(fields, "lastChangeTime")?,
        odds,
    })
}
