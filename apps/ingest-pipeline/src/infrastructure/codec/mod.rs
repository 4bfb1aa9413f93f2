//! Wire Codec
//!
//! Protobuf row types for the two record variants and the schema descriptors
//! the remote store needs to interpret them. The row structs are
//! hand-maintained `prost` messages: the wire surface is two fixed shapes, so
//! the descriptors are derived here by hand and must stay in lockstep with
//! the field attributes below. Field numbers are never reused.
//!
//! Production code only encodes; `prost` gives decoding for free, which the
//! round-trip tests use to verify the schema is lossless for every declared
//! field.
//!
//! Timestamps travel as UTC strings in `%Y-%m-%d %H:%M:%S%.6f` form, the
//! format the downstream warehouse tables ingest.

use chrono::{DateTime, Utc};
use prost::Message;
use prost_types::{DescriptorProto, FieldDescriptorProto, field_descriptor_proto};

use crate::application::ports::{EncodingError, WireRecord};
use crate::domain::record::{FeedItemRecord, MarketSnapshotRecord};

/// Wire form of timestamp fields.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// =============================================================================
// Row Messages
// =============================================================================

/// Wire row for one market snapshot.
#[derive(Clone, PartialEq, Message)]
pub struct SnapshotRow {
    /// Ticker symbol of the tracked instrument.
    #[prost(string, tag = "1")]
    pub symbol: String,

    /// Bar timestamp, UTC string form.
    #[prost(string, tag = "2")]
    pub bar_time: String,

    /// Opening price.
    #[prost(double, tag = "3")]
    pub open: f64,

    /// High price.
    #[prost(double, tag = "4")]
    pub high: f64,

    /// Low price.
    #[prost(double, tag = "5")]
    pub low: f64,

    /// Closing price.
    #[prost(double, tag = "6")]
    pub close: f64,

    /// Closing price adjusted for splits and dividends.
    #[prost(double, tag = "7")]
    pub adjusted_close: f64,

    /// Traded volume.
    #[prost(int64, tag = "8")]
    pub volume: i64,

    /// Capture timestamp, UTC string form.
    #[prost(string, tag = "9")]
    pub ingested_at: String,
}

/// Wire row for one feed item.
#[derive(Clone, PartialEq, Message)]
pub struct FeedItemRow {
    /// Source-assigned unique identifier.
    #[prost(string, tag = "1")]
    pub item_id: String,

    /// Item title.
    #[prost(string, tag = "2")]
    pub title: String,

    /// Item body. May be empty.
    #[prost(string, tag = "3")]
    pub body: String,

    /// Creation timestamp at the source, UTC string form.
    #[prost(string, tag = "4")]
    pub created_at: String,

    /// Capture timestamp, UTC string form.
    #[prost(string, tag = "5")]
    pub ingested_at: String,
}

// =============================================================================
// Schema Descriptors
// =============================================================================

fn field(name: &str, number: i32, kind: field_descriptor_proto::Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(field_descriptor_proto::Label::Optional as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

/// Descriptor for [`SnapshotRow`], registered at session open.
#[must_use]
pub fn snapshot_descriptor() -> DescriptorProto {
    use field_descriptor_proto::Type;

    DescriptorProto {
        name: Some("SnapshotRow".to_string()),
        field: vec![
            field("symbol", 1, Type::String),
            field("bar_time", 2, Type::String),
            field("open", 3, Type::Double),
            field("high", 4, Type::Double),
            field("low", 5, Type::Double),
            field("close", 6, Type::Double),
            field("adjusted_close", 7, Type::Double),
            field("volume", 8, Type::Int64),
            field("ingested_at", 9, Type::String),
        ],
        ..Default::default()
    }
}

/// Descriptor for [`FeedItemRow`], registered at session open.
#[must_use]
pub fn feed_item_descriptor() -> DescriptorProto {
    use field_descriptor_proto::Type;

    DescriptorProto {
        name: Some("FeedItemRow".to_string()),
        field: vec![
            field("item_id", 1, Type::String),
            field("title", 2, Type::String),
            field("body", 3, Type::String),
            field("created_at", 4, Type::String),
            field("ingested_at", 5, Type::String),
        ],
        ..Default::default()
    }
}

// =============================================================================
// Record Encoding
// =============================================================================

fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format(WIRE_TIMESTAMP_FORMAT).to_string()
}

fn finite(name: &'static str, value: f64) -> Result<f64, EncodingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EncodingError::NonFinitePrice { field: name, value })
    }
}

impl WireRecord for MarketSnapshotRecord {
    fn descriptor() -> DescriptorProto {
        snapshot_descriptor()
    }

    fn stamp(&mut self, ingested_at: DateTime<Utc>) {
        self.ingested_at = ingested_at;
    }

    fn to_row_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        if self.symbol.is_empty() {
            return Err(EncodingError::EmptyField("symbol"));
        }
        if self.volume < 0 {
            return Err(EncodingError::NegativeVolume(self.volume));
        }

        let row = SnapshotRow {
            symbol: self.symbol.clone(),
            bar_time: format_utc(self.bar_time),
            open: finite("open", self.open)?,
            high: finite("high", self.high)?,
            low: finite("low", self.low)?,
            close: finite("close", self.close)?,
            adjusted_close: finite("adjusted_close", self.adjusted_close)?,
            volume: self.volume,
            ingested_at: format_utc(self.ingested_at),
        };

        Ok(row.encode_to_vec())
    }
}

impl WireRecord for FeedItemRecord {
    fn descriptor() -> DescriptorProto {
        feed_item_descriptor()
    }

    fn stamp(&mut self, ingested_at: DateTime<Utc>) {
        self.ingested_at = ingested_at;
    }

    fn to_row_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        if self.item_id.is_empty() {
            return Err(EncodingError::EmptyField("item_id"));
        }

        let row = FeedItemRow {
            item_id: self.item_id.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            created_at: format_utc(self.created_at),
            ingested_at: format_utc(self.ingested_at),
        };

        Ok(row.encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone};
    use proptest::prelude::*;

    fn parse_wire(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, WIRE_TIMESTAMP_FORMAT)
            .unwrap()
            .and_utc()
    }

    fn sample_snapshot() -> MarketSnapshotRecord {
        MarketSnapshotRecord {
            symbol: "AAPL".to_string(),
            bar_time: Utc.with_ymd_and_hms(2024, 3, 8, 14, 30, 0).unwrap(),
            open: 172.5,
            high: 173.1,
            low: 172.2,
            close: 172.9,
            adjusted_close: 172.9,
            volume: 120_394,
            ingested_at: Utc.with_ymd_and_hms(2024, 3, 8, 14, 30, 2).unwrap(),
        }
    }

    #[test]
    fn rejects_non_finite_price() {
        let mut record = sample_snapshot();
        record.high = f64::NAN;
        assert!(matches!(
            record.to_row_bytes(),
            Err(EncodingError::NonFinitePrice { field: "high", .. })
        ));

        record = sample_snapshot();
        record.open = f64::INFINITY;
        assert!(matches!(
            record.to_row_bytes(),
            Err(EncodingError::NonFinitePrice { field: "open", .. })
        ));
    }

    #[test]
    fn rejects_negative_volume() {
        let mut record = sample_snapshot();
        record.volume = -1;
        assert!(matches!(
            record.to_row_bytes(),
            Err(EncodingError::NegativeVolume(-1))
        ));
    }

    #[test]
    fn rejects_empty_identifiers() {
        let mut record = sample_snapshot();
        record.symbol.clear();
        assert!(matches!(
            record.to_row_bytes(),
            Err(EncodingError::EmptyField("symbol"))
        ));

        let item = FeedItemRecord {
            item_id: String::new(),
            title: "t".to_string(),
            body: String::new(),
            created_at: Utc::now(),
            ingested_at: Utc::now(),
        };
        assert!(matches!(
            item.to_row_bytes(),
            Err(EncodingError::EmptyField("item_id"))
        ));
    }

    #[test]
    fn snapshot_descriptor_matches_row_shape() {
        use field_descriptor_proto::Type;

        let descriptor = snapshot_descriptor();
        assert_eq!(descriptor.name.as_deref(), Some("SnapshotRow"));

        let fields: Vec<(&str, i32, i32)> = descriptor
            .field
            .iter()
            .map(|f| (f.name.as_deref().unwrap(), f.number.unwrap(), f.r#type.unwrap()))
            .collect();

        assert_eq!(
            fields,
            vec![
                ("symbol", 1, Type::String as i32),
                ("bar_time", 2, Type::String as i32),
                ("open", 3, Type::Double as i32),
                ("high", 4, Type::Double as i32),
                ("low", 5, Type::Double as i32),
                ("close", 6, Type::Double as i32),
                ("adjusted_close", 7, Type::Double as i32),
                ("volume", 8, Type::Int64 as i32),
                ("ingested_at", 9, Type::String as i32),
            ]
        );
    }

    #[test]
    fn feed_item_descriptor_matches_row_shape() {
        let descriptor = feed_item_descriptor();
        assert_eq!(descriptor.name.as_deref(), Some("FeedItemRow"));
        let names: Vec<&str> = descriptor
            .field
            .iter()
            .map(|f| f.name.as_deref().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["item_id", "title", "body", "created_at", "ingested_at"]
        );
    }

    prop_compose! {
        // Microsecond precision: the wire format carries no finer resolution.
        fn arb_utc()(secs in 0i64..4_102_444_800i64, micros in 0u32..1_000_000u32) -> DateTime<Utc> {
            Utc.timestamp_opt(secs, micros * 1_000).single().unwrap()
        }
    }

    prop_compose! {
        fn arb_snapshot()(
            symbol in "[A-Z]{1,5}",
            bar_time in arb_utc(),
            open in -1.0e9..1.0e9f64,
            high in -1.0e9..1.0e9f64,
            low in -1.0e9..1.0e9f64,
            close in -1.0e9..1.0e9f64,
            adjusted_close in -1.0e9..1.0e9f64,
            volume in 0i64..1_000_000_000_000i64,
            ingested_at in arb_utc(),
        ) -> MarketSnapshotRecord {
            MarketSnapshotRecord {
                symbol, bar_time, open, high, low, close, adjusted_close, volume, ingested_at,
            }
        }
    }

    prop_compose! {
        fn arb_feed_item()(
            item_id in "[a-z0-9]{1,12}",
            title in any::<String>(),
            body in any::<String>(),
            created_at in arb_utc(),
            ingested_at in arb_utc(),
        ) -> FeedItemRecord {
            FeedItemRecord { item_id, title, body, created_at, ingested_at }
        }
    }

    proptest! {
        #[test]
        fn snapshot_round_trip_is_lossless(record in arb_snapshot()) {
            let bytes = record.to_row_bytes().unwrap();
            let row = SnapshotRow::decode(bytes.as_slice()).unwrap();

            prop_assert_eq!(&row.symbol, &record.symbol);
            prop_assert_eq!(parse_wire(&row.bar_time), record.bar_time);
            prop_assert_eq!(row.open, record.open);
            prop_assert_eq!(row.high, record.high);
            prop_assert_eq!(row.low, record.low);
            prop_assert_eq!(row.close, record.close);
            prop_assert_eq!(row.adjusted_close, record.adjusted_close);
            prop_assert_eq!(row.volume, record.volume);
            prop_assert_eq!(parse_wire(&row.ingested_at), record.ingested_at);
        }

        #[test]
        fn feed_item_round_trip_is_lossless(record in arb_feed_item()) {
            let bytes = record.to_row_bytes().unwrap();
            let row = FeedItemRow::decode(bytes.as_slice()).unwrap();

            prop_assert_eq!(&row.item_id, &record.item_id);
            prop_assert_eq!(&row.title, &record.title);
            prop_assert_eq!(&row.body, &record.body);
            prop_assert_eq!(parse_wire(&row.created_at), record.created_at);
            prop_assert_eq!(parse_wire(&row.ingested_at), record.ingested_at);
        }

        #[test]
        fn encoding_is_deterministic(record in arb_snapshot()) {
            prop_assert_eq!(record.to_row_bytes().unwrap(), record.to_row_bytes().unwrap());
        }
    }
}
