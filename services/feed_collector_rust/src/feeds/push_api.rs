//! Push provider client and wire format.
//!
//! Two long-lived event-stream endpoints: a full-snapshot bootstrap stream
//! and a continuous live stream resumed from a unix-seconds cursor. Frames
//! are delimited by a blank line; a frame is either `data: END <unixSeconds>`
//! (end of bootstrap) or an optionally `event:`-typed JSON payload of match
//! headers and coded bet records.
//!
//! The HTTP client is built without a request timeout: streams stay open
//! until the upstream closes them or the session is cancelled.

use oddsfeed_rust_core::{FeedError, Match, OddsSet, Sport};
use serde::Deserialize;
use tracing::warn;

pub struct PushFeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl PushFeedClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder().build().unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Open the bootstrap snapshot stream.
    pub async fn open_bootstrap_stream(&self) -> Result<reqwest::Response, FeedError> {
        self.open_stream(format!("{}/feed/full", self.base_url)).await
    }

    /// Open the continuous live stream from a unix-seconds resume cursor.
    pub async fn open_live_stream(&self, since: i64) -> Result<reqwest::Response, FeedError> {
        self.open_stream(format!("{}/feed/live?since={}", self.base_url, since))
            .await
    }

    async fn open_stream(&self, url: String) -> Result<reqwest::Response, FeedError> {
        let resp = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(FeedError::upstream)?;
        if !resp.status().is_success() {
            warn!("Stream endpoint {} returned {}", url, resp.status());
            return Err(FeedError::UpstreamUnavailable(format!(
                "{} -> {}",
                url,
                resp.status()
            )));
        }
        Ok(resp)
    }
}

/// One JSON payload frame from either stream phase.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushPayload {
    pub headers: Vec<PushMatchHeader>,
    pub odds: Vec<PushCodedBet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushMatchHeader {
    pub id: i64,
    pub match_code: String,
    pub home: String,
    pub away: String,
    pub league_name: String,
    pub league_short_name: String,
    /// Epoch millis
    pub kick_off_time: i64,
    pub status: String,
    pub live: bool,
    /// Playability flag as sent upstream; negated into `Match::blocked`
    pub playable: bool,
    pub top: bool,
    /// Epoch millis
    pub last_change: i64,
}

impl PushMatchHeader {
    pub fn into_match(self, sport: Sport, odds: OddsSet) -> Match {
        Match {
            id: self.id,
            match_code: self.match_code,
            home: self.home,
            away: self.away,
            league: self.league_name,
            league_short: self.league_short_name,
            sport,
            kick_off_time: self.kick_off_time,
            status: self.status,
            is_live: self.live,
            blocked: !self.playable,
            favourite: self.top,
            last_change_time: self.last_change,
            odds,
        }
    }
}

/// Coded bet record: numeric pick code ("om"), raw pick id ("bpc"),
/// decimal value and optional special-value string for line markets.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PushCodedBet {
    #[serde(rename = "matchId")]
    pub match_id: i64,
    pub om: u32,
    pub bpc: i64,
    #[serde(rename = "ov")]
    pub value: f64,
    #[serde(rename = "sv")]
    pub special_value: Option<String>,
}

/// One parsed stream frame.
#[derive(Debug, PartialEq)]
pub enum StreamFrame {
    /// End-of-bootstrap marker carrying the resume timestamp (unix seconds)
    End { timestamp: i64 },
    /// Data payload, typed by the optional `event:` line
    Payload { event: Option<String>, data: String },
}

/// Parse one raw frame (the text between blank-line delimiters).
pub fn parse_frame(raw: &str) -> Option<StreamFrame> {
    let mut event = None;
    let mut data_lines = Vec::new();

    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start());
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");

    if let Some(ts) = data.strip_prefix("END ") {
        match ts.trim().parse() {
            Ok(timestamp) => return Some(StreamFrame::End { timestamp }),
            Err(_) => {
                warn!("Dropping END frame with bad timestamp: {}", data);
                return None;
            }
        }
    }

    Some(StreamFrame::Payload { event, data })
}

/// Reassembles blank-line-delimited frames from raw byte chunks.
///
/// Chunk boundaries are arbitrary; the buffer holds bytes until a full
/// frame (terminated by `\n\n`) is available.
#[derive(Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete frame it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&frame[..pos]);
            let text = text.trim();
            if !text.is_empty() {
                frames.push(text.to_string());
            }
        }
        frames
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == &b"\n\n"[..])
}
