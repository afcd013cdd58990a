//! Local file snapshot backend.
//!
//! The durable artifact consumers load when the collector is not running:
//! one JSON document per feed, merge-updated in place by match id.

use crate::error::FeedError;
use crate::types::{Match, SnapshotMetadata, Sport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk snapshot document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotDocument {
    pub matches: Vec<Match>,
    /// Epoch millis of the last flush
    pub last_updated: i64,
    pub collection_interval: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_sport: Option<Sport>,
    pub total_matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_leagues: Option<usize>,
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-merge-write: existing entries are updated by id, new entries
    /// appended, entries absent from this snapshot are left in place.
    pub fn save(&self, matches: &[Match], meta: &SnapshotMetadata) -> Result<(), FeedError> {
        let mut doc = self.read_document();

        for incoming in matches {
            match doc.matches.iter_mut().find(|m| m.id == incoming.id) {
                Some(existing) => *existing = incoming.clone(),
                None => doc.matches.push(incoming.clone()),
            }
        }

        doc.last_updated = meta.last_updated;
        doc.collection_interval = meta.collection_interval;
        doc.selected_sport = Some(meta.selected_sport);
        doc.total_matches = doc.matches.len();
        doc.total_leagues = Some(meta.total_leagues);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(FeedError::storage)?;
            }
        }
        let json = serde_json::to_string_pretty(&doc).map_err(FeedError::storage)?;
        fs::write(&self.path, json).map_err(FeedError::storage)?;
        debug!(
            "Saved {} matches to snapshot file {:?}",
            doc.matches.len(),
            self.path
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<Match>, FeedError> {
        Ok(self.read_document().matches)
    }

    pub fn clear(&self) -> Result<(), FeedError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedError::storage(e)),
        }
    }

    /// A missing or corrupt document starts a fresh one; corruption is
    /// logged and overwritten on the next save.
    fn read_document(&self) -> SnapshotDocument {
        if !self.path.exists() {
            return SnapshotDocument::default();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read snapshot file {:?}: {}", self.path, e);
                return SnapshotDocument::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Snapshot file {:?} is corrupt, starting fresh: {}", self.path, e);
                SnapshotDocument::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketOdds, OddsQuote, OddsSet};
    use tempfile::tempdir;

    fn sample_match(id: i64) -> Match {
        let mut odds = OddsSet::new();
        odds.insert(
            "fullTimeResultHomeWin".to_string(),
            MarketOdds::Single(OddsQuote {
                value: 1.85,
                pick_code: 1,
            }),
        );
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
            is_live: false,
            blocked: false,
            favourite: true,
            last_change_time: 5,
            odds,
        }
    }

    fn meta() -> SnapshotMetadata {
        SnapshotMetadata {
            last_updated: 1_700_000_100_000,
            collection_interval: 30,
            selected_sport: Sport::Football,
            total_matches: 1,
            total_leagues: 1,
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("matches.json"));

        storage.save(&[sample_match(1), sample_match(2)], &meta()).unwrap();
        let loaded = storage.load().unwrap();

        let mut ids: Vec<_> = loaded.iter().map(|m| m.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert!(loaded.iter().all(|m| m.odds.contains_key("fullTimeResultHomeWin")));
    }

    #[test]
    fn test_save_merges_by_id() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("matches.json"));

        storage.save(&[sample_match(1)], &meta()).unwrap();

        let mut updated = sample_match(1);
        updated.status = "finished".to_string();
        storage.save(&[updated, sample_match(3)], &meta()).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let one = loaded.iter().find(|m| m.id == 1).unwrap();
        assert_eq!(one.status, "finished");
    }

    #[test]
    fn test_clear_removes_document() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("matches.json"));

        storage.save(&[sample_match(1)], &meta()).unwrap();
        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_empty());
        // Clearing a missing file is not an error
        storage.clear().unwrap();
    }

    #[test]
    fn test_corrupt_document_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.load().unwrap().is_empty());
        storage.save(&[sample_match(9)], &meta()).unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
    }
}
