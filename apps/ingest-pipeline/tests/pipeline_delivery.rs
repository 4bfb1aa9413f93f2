//! Pipeline Delivery Integration Tests
//!
//! Drives the supervisor-wrapped ingestion loop against scripted fakes of
//! both collaborators and verifies the delivery contract: at-least-once
//! across acknowledgment failures, one stream close per stream open on every
//! exit path, gate-paced acquisition, and fresh sessions after restarts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use prost::Message;
use tokio_util::sync::CancellationToken;

use ingest_pipeline::{
    AppendAck, AppendBatch, FeedItemRecord, FeedItemRow, Gate, IngestLoop, MarketSnapshotRecord,
    PipelineError, RecordSource, RestartConfig, SessionError, SinkError, SourceError, StorageWrite,
    StreamRef, Supervisor, SupervisorError, TablePath,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct SinkState {
    streams_created: Vec<String>,
    streams_closed: Vec<String>,
    /// (stream name, row bytes) per committed row.
    appended: Vec<(String, Vec<u8>)>,
    append_calls: usize,
    /// 1-based global append call that fails once.
    fail_append_on_call: Option<usize>,
}

/// Scripted sink. Clones share state, so a factory can hand a "fresh"
/// transport to every restart while the test observes the whole history.
#[derive(Clone, Default)]
struct FakeSink {
    state: Arc<Mutex<SinkState>>,
    cancel_after_append: Option<CancellationToken>,
}

impl FakeSink {
    fn new() -> Self {
        Self::default()
    }

    fn failing_append_call(call: usize) -> Self {
        let sink = Self::new();
        sink.state.lock().unwrap().fail_append_on_call = Some(call);
        sink
    }

    fn state(&self) -> Arc<Mutex<SinkState>> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl StorageWrite for FakeSink {
    async fn create_stream(&mut self, table: &TablePath) -> Result<StreamRef, SinkError> {
        let mut state = self.state.lock().unwrap();
        let name = format!("{}/streams/s{}", table.parent(), state.streams_created.len());
        state.streams_created.push(name.clone());
        Ok(StreamRef { name })
    }

    async fn append(
        &mut self,
        stream: &StreamRef,
        batch: AppendBatch,
    ) -> Result<AppendAck, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.append_calls += 1;
        if state.fail_append_on_call == Some(state.append_calls) {
            return Err(SinkError::Append {
                message: "simulated quota failure".to_string(),
            });
        }

        let offset = i64::try_from(state.appended.len()).unwrap();
        for row in batch.rows {
            state.appended.push((stream.name.clone(), row));
        }
        drop(state);

        if let Some(token) = &self.cancel_after_append {
            token.cancel();
        }

        Ok(AppendAck {
            offset,
            row_count: 1,
        })
    }

    async fn close_stream(&mut self, stream: &StreamRef) -> Result<(), SinkError> {
        self.state
            .lock()
            .unwrap()
            .streams_closed
            .push(stream.name.clone());
        Ok(())
    }
}

/// Feed source that replays a fixed item list from the top, then ends the
/// stream. A fresh instance per restart models a reconnecting subscription
/// that re-delivers recent items (duplicates are the pipeline's problem to
/// tolerate, not the source's to prevent).
struct ReplaySource {
    items: Vec<FeedItemRecord>,
    cursor: usize,
}

impl ReplaySource {
    fn new(items: Vec<FeedItemRecord>) -> Self {
        Self { items, cursor: 0 }
    }
}

#[async_trait]
impl RecordSource for ReplaySource {
    type Record = FeedItemRecord;

    async fn next_record(&mut self) -> Result<FeedItemRecord, SourceError> {
        match self.items.get(self.cursor) {
            Some(item) => {
                self.cursor += 1;
                Ok(item.clone())
            }
            None => Err(SourceError::StreamEnded),
        }
    }
}

/// Replay source whose first acquisition ever (across all instances) fails
/// with a transient fetch error.
struct FlakyReplaySource {
    global_calls: Arc<AtomicUsize>,
    inner: ReplaySource,
}

#[async_trait]
impl RecordSource for FlakyReplaySource {
    type Record = FeedItemRecord;

    async fn next_record(&mut self) -> Result<FeedItemRecord, SourceError> {
        if self.global_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(SourceError::Fetch("transient source outage".to_string()));
        }
        self.inner.next_record().await
    }
}

/// Polling source that serves the same latest snapshot forever.
struct CountingSnapshotSource {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordSource for CountingSnapshotSource {
    type Record = MarketSnapshotRecord;

    async fn next_record(&mut self) -> Result<MarketSnapshotRecord, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(snapshot())
    }
}

/// Gate that reports closed for the first `open_after` checks.
struct ScriptedGate {
    checks: Arc<AtomicUsize>,
    open_after: usize,
}

impl Gate for ScriptedGate {
    fn is_open(&self, _now: DateTime<Utc>) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) >= self.open_after
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn table() -> TablePath {
    TablePath::new("acme".into(), "social".into(), "posts".into())
}

fn feed_item(id: &str) -> FeedItemRecord {
    FeedItemRecord {
        item_id: id.to_string(),
        title: format!("title {id}"),
        body: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap(),
        ingested_at: Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap(),
    }
}

fn snapshot() -> MarketSnapshotRecord {
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

fn decoded_item_ids(state: &Arc<Mutex<SinkState>>) -> Vec<String> {
    state
        .lock()
        .unwrap()
        .appended
        .iter()
        .map(|(_, bytes)| FeedItemRow::decode(bytes.as_slice()).unwrap().item_id)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn at_least_once_across_an_ack_failure() {
    let items = vec![feed_item("i1"), feed_item("i2"), feed_item("i3")];
    // Second append ever is rejected; everything else commits.
    let sink = FakeSink::failing_append_call(2);
    let state = sink.state();
    let cancel = CancellationToken::new();

    let supervisor = Supervisor::new(
        RestartConfig {
            max_restarts: 2,
            ..Default::default()
        },
        cancel.clone(),
    );

    let result = supervisor
        .run(move || {
            let source = ReplaySource::new(items.clone());
            let sink = sink.clone();
            let table = table();
            let cancel = cancel.clone();
            async move { IngestLoop::subscription(source, table, cancel).run(sink).await }
        })
        .await;

    // The replay source always ends its stream, so the supervisor eventually
    // exhausts its budget; delivery must still be complete by then.
    assert!(matches!(
        result,
        Err(SupervisorError::RestartsExhausted { .. })
    ));

    let ids = decoded_item_ids(&state);
    for expected in ["i1", "i2", "i3"] {
        assert!(ids.iter().any(|id| id == expected), "{expected} was dropped");
    }
    // Duplicates are acceptable; drops are not.
    assert!(ids.len() >= 3);

    // Every opened session was closed, one close per open.
    let state = state.lock().unwrap();
    assert_eq!(state.streams_created.len(), 3);
    assert_eq!(state.streams_closed, state.streams_created);
}

#[tokio::test]
async fn session_closes_when_append_fails() {
    let sink = FakeSink::failing_append_call(1);
    let state = sink.state();

    let result = IngestLoop::subscription(
        ReplaySource::new(vec![feed_item("i1")]),
        table(),
        CancellationToken::new(),
    )
    .run(sink)
    .await;

    assert!(matches!(
        result,
        Err(PipelineError::Session(SessionError::Append(_)))
    ));

    let state = state.lock().unwrap();
    assert_eq!(state.streams_created.len(), 1);
    assert_eq!(state.streams_closed, state.streams_created);
}

#[tokio::test]
async fn subscription_end_is_a_failure_and_still_closes() {
    let sink = FakeSink::new();
    let state = sink.state();

    let result = IngestLoop::subscription(
        ReplaySource::new(vec![]),
        table(),
        CancellationToken::new(),
    )
    .run(sink)
    .await;

    assert!(matches!(result, Err(PipelineError::UnexpectedStreamEnd)));

    let state = state.lock().unwrap();
    assert_eq!(state.streams_created.len(), 1);
    assert_eq!(state.streams_closed, state.streams_created);
}

#[tokio::test]
async fn closed_gate_skips_cycles_without_fetching() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let checks = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let mut sink = FakeSink::new();
    sink.cancel_after_append = Some(cancel.clone());
    let state = sink.state();

    let source = CountingSnapshotSource {
        fetches: Arc::clone(&fetches),
    };
    let gate = ScriptedGate {
        checks: Arc::clone(&checks),
        open_after: 2,
    };

    let result = IngestLoop::polling(
        source,
        table(),
        Duration::from_millis(5),
        Some(Box::new(gate)),
        cancel,
    )
    .run(sink)
    .await;

    assert!(result.is_ok());
    // Two closed checks produced no acquisition; the third check opened the
    // gate and exactly one fetch/append cycle ran before cancellation.
    assert_eq!(checks.load(Ordering::SeqCst), 3);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(state.lock().unwrap().appended.len(), 1);
}

#[tokio::test]
async fn restart_opens_a_fresh_stream_after_source_failure() {
    let global_calls = Arc::new(AtomicUsize::new(0));
    let sink = FakeSink::new();
    let state = sink.state();
    let cancel = CancellationToken::new();

    let supervisor = Supervisor::new(
        RestartConfig {
            max_restarts: 1,
            ..Default::default()
        },
        cancel.clone(),
    );

    let result = supervisor
        .run(move || {
            let source = FlakyReplaySource {
                global_calls: Arc::clone(&global_calls),
                inner: ReplaySource::new(vec![feed_item("i1")]),
            };
            let sink = sink.clone();
            let table = table();
            let cancel = cancel.clone();
            async move { IngestLoop::subscription(source, table, cancel).run(sink).await }
        })
        .await;

    assert!(matches!(
        result,
        Err(SupervisorError::RestartsExhausted { .. })
    ));

    let state = state.lock().unwrap();
    // First session failed on fetch before any append; the restart opened a
    // new stream and delivered on it. The failed handle was never written to.
    assert_eq!(state.streams_created.len(), 2);
    assert_ne!(state.streams_created[0], state.streams_created[1]);
    assert_eq!(state.streams_closed, state.streams_created);
    assert_eq!(state.appended.len(), 1);
    assert_eq!(state.appended[0].0, state.streams_created[1]);
}

#[tokio::test]
async fn cancellation_exits_cleanly_without_restart() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let sink = FakeSink::new();
    let state = sink.state();

    let result = IngestLoop::subscription(
        ReplaySource::new(vec![feed_item("i1")]),
        table(),
        cancel,
    )
    .run(sink)
    .await;

    assert!(result.is_ok());

    // The session opened and closed; the pre-cancelled loop never fetched.
    let state = state.lock().unwrap();
    assert_eq!(state.streams_created.len(), 1);
    assert_eq!(state.streams_closed, state.streams_created);
    assert!(state.appended.is_empty());
}
