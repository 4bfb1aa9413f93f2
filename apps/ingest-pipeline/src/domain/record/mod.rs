//! Ingested Record Types
//!
//! Canonical in-process representation of the two record variants the
//! pipeline can carry. A deployment runs exactly one variant; the records are
//! immutable value objects created fresh each cycle, encoded, and discarded.
//!
//! Timestamps are always UTC. `ingested_at` is stamped by the ingestion loop
//! (monotonically non-decreasing within a session), not by the source
//! adapter.

use chrono::{DateTime, Utc};

/// One snapshot of the most recent price bar for a tracked instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshotRecord {
    /// Ticker symbol of the tracked instrument. Never empty.
    pub symbol: String,
    /// Time the underlying price bar represents.
    pub bar_time: DateTime<Utc>,
    /// Opening price of the bar.
    pub open: f64,
    /// High price of the bar.
    pub high: f64,
    /// Low price of the bar.
    pub low: f64,
    /// Closing price of the bar.
    pub close: f64,
    /// Closing price adjusted for splits and dividends.
    pub adjusted_close: f64,
    /// Traded volume. Non-negative.
    pub volume: i64,
    /// Time this pipeline captured the record.
    pub ingested_at: DateTime<Utc>,
}

/// One item from a firehose-style subscription feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItemRecord {
    /// Source-assigned unique identifier. Never empty.
    pub item_id: String,
    /// Item title.
    pub title: String,
    /// Item body. May be empty.
    pub body: String,
    /// Time of original creation at the source.
    pub created_at: DateTime<Utc>,
    /// Time this pipeline captured the record.
    pub ingested_at: DateTime<Utc>,
}
