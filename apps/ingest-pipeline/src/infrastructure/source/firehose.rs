//! Subscription Feed Source
//!
//! Consumes an open-ended WebSocket feed of items: connect, authenticate,
//! subscribe to a topic, then block on the next item. Semantically an
//! unbounded, non-restartable sequence - connection failure raises, and a
//! clean close raises [`SourceError::StreamEnded`] because a live feed is
//! expected to be infinite. Reconnection is the supervisor's job, one layer
//! up, so this adapter carries none.
//!
//! # Protocol
//!
//! Client frames:
//!
//! ```json
//! {"action": "auth", "client_id": "...", "client_secret": "..."}
//! {"action": "subscribe", "topic": "..."}
//! ```
//!
//! Server frames are either control messages (`{"status": "authenticated" |
//! "subscribed" | "error", "msg": ...}`) or items
//! (`{"id", "title", "body", "created_at"}` with `created_at` in epoch
//! seconds).

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::record::FeedItemRecord;
use crate::infrastructure::config::FeedCredentials;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings for the subscription feed source.
#[derive(Debug, Clone)]
pub struct FeedSubscriberConfig {
    /// WebSocket endpoint of the feed.
    pub url: String,
    /// Topic to subscribe to.
    pub topic: String,
    /// Credentials for the auth handshake.
    pub credentials: FeedCredentials,
}

/// Subscription implementation of the `RecordSource` port.
pub struct FeedSubscriber {
    socket: Socket,
}

impl FeedSubscriber {
    /// Connect, authenticate, and subscribe.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] when the connection or handshake
    /// fails.
    pub async fn connect(config: FeedSubscriberConfig) -> Result<Self, SourceError> {
        tracing::info!(url = %config.url, topic = %config.topic, "connecting to feed");

        let (socket, _response) = connect_async(&config.url)
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;
        let mut subscriber = Self { socket };

        subscriber
            .send_json(&json!({
                "action": "auth",
                "client_id": config.credentials.client_id(),
                "client_secret": config.credentials.client_secret(),
            }))
            .await?;
        subscriber.await_status("authenticated").await?;

        subscriber
            .send_json(&json!({
                "action": "subscribe",
                "topic": config.topic,
            }))
            .await?;
        subscriber.await_status("subscribed").await?;

        tracing::info!(topic = %config.topic, "feed subscription established");
        Ok(subscriber)
    }

    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), SourceError> {
        self.socket
            .send(Message::Text(value.to_string().into()))
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))
    }

    /// Read control frames until `expected` arrives. Items seen before the
    /// handshake completes are dropped.
    async fn await_status(&mut self, expected: &str) -> Result<(), SourceError> {
        loop {
            match self.next_frame().await? {
                Frame::Control(control) if control.status == expected => return Ok(()),
                Frame::Control(control) if control.status == "error" => {
                    return Err(SourceError::Connect(
                        control
                            .msg
                            .unwrap_or_else(|| "feed reported an error".to_string()),
                    ));
                }
                Frame::Control(_) | Frame::Item(_) | Frame::Ignored => {}
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return parse_frame(text.as_str()),
                Some(Ok(Message::Ping(data))) => {
                    self.socket
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| SourceError::Connect(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Err(SourceError::StreamEnded),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(SourceError::Fetch(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl RecordSource for FeedSubscriber {
    type Record = FeedItemRecord;

    async fn next_record(&mut self) -> Result<FeedItemRecord, SourceError> {
        loop {
            match self.next_frame().await? {
                Frame::Item(record) => return Ok(record),
                Frame::Control(control) if control.status == "error" => {
                    return Err(SourceError::Fetch(
                        control
                            .msg
                            .unwrap_or_else(|| "feed reported an error".to_string()),
                    ));
                }
                Frame::Control(_) | Frame::Ignored => {}
            }
        }
    }
}

// =============================================================================
// Frame Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct ControlFrame {
    status: String,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemFrame {
    id: String,
    title: String,
    #[serde(default)]
    body: String,
    /// Epoch seconds, possibly fractional.
    created_at: f64,
}

#[derive(Debug)]
enum Frame {
    Item(FeedItemRecord),
    Control(ControlFrame),
    Ignored,
}

fn parse_frame(text: &str) -> Result<Frame, SourceError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SourceError::Payload(e.to_string()))?;

    if value.get("id").is_some() {
        let frame: ItemFrame =
            serde_json::from_value(value).map_err(|e| SourceError::Payload(e.to_string()))?;
        Ok(Frame::Item(item_record(frame)?))
    } else if value.get("status").is_some() {
        let frame: ControlFrame =
            serde_json::from_value(value).map_err(|e| SourceError::Payload(e.to_string()))?;
        Ok(Frame::Control(frame))
    } else {
        Ok(Frame::Ignored)
    }
}

fn item_record(frame: ItemFrame) -> Result<FeedItemRecord, SourceError> {
    let millis = (frame.created_at * 1000.0).round();
    if !millis.is_finite() {
        return Err(SourceError::Payload(format!(
            "item timestamp {} is not finite",
            frame.created_at
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    let created_at = Utc
        .timestamp_millis_opt(millis as i64)
        .single()
        .ok_or_else(|| {
            SourceError::Payload(format!("item timestamp {} out of range", frame.created_at))
        })?;

    Ok(FeedItemRecord {
        item_id: frame.id,
        title: frame.title,
        body: frame.body,
        created_at,
        // Placeholder; the ingestion loop stamps the real capture time.
        ingested_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_frames_become_records() {
        let frame = parse_frame(
            r#"{"id": "abc123", "title": "hello", "body": "text", "created_at": 1709906400.5}"#,
        )
        .unwrap();

        match frame {
            Frame::Item(record) => {
                assert_eq!(record.item_id, "abc123");
                assert_eq!(record.title, "hello");
                assert_eq!(record.body, "text");
                assert_eq!(record.created_at.timestamp_millis(), 1_709_906_400_500);
            }
            other => panic!("expected item frame, got {other:?}"),
        }
    }

    #[test]
    fn body_may_be_absent() {
        let frame =
            parse_frame(r#"{"id": "x", "title": "t", "created_at": 1700000000}"#).unwrap();
        match frame {
            Frame::Item(record) => assert_eq!(record.body, ""),
            other => panic!("expected item frame, got {other:?}"),
        }
    }

    #[test]
    fn control_frames_are_recognized() {
        let frame = parse_frame(r#"{"status": "authenticated"}"#).unwrap();
        assert!(matches!(frame, Frame::Control(c) if c.status == "authenticated"));
    }

    #[test]
    fn unknown_frames_are_ignored() {
        let frame = parse_frame(r#"{"heartbeat": true}"#).unwrap();
        assert!(matches!(frame, Frame::Ignored));
    }

    #[test]
    fn malformed_json_is_a_payload_error() {
        assert!(matches!(
            parse_frame("not json"),
            Err(SourceError::Payload(_))
        ));
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let result = parse_frame(r#"{"id": "x", "title": "t", "created_at": 1.0e30}"#);
        assert!(matches!(result, Err(SourceError::Payload(_))));
    }
}
