//! Ingestion Loop
//!
//! The cycle at the heart of the pipeline: acquire one record, stamp it,
//! encode it, append it, wait for the acknowledgment, repeat. Strictly
//! sequential - the next acquisition never starts before the previous batch
//! is acknowledged, so there is no pipelining and no backpressure to manage.
//!
//! One generic loop serves both operating modes (the two differ only in
//! pacing):
//!
//! - **Polling** (market snapshots): an interval sleep between cycles and an
//!   optional market-hours gate. A closed gate skips the cycle - sleep and
//!   recheck, never an error.
//! - **Subscription** (feed items): no sleep; the source's own blocking is
//!   the pacing mechanism. The feed is expected to be infinite, so a clean
//!   end of stream is a failure ([`PipelineError::UnexpectedStreamEnd`]).
//!
//! Exactly one [`AppendSession`] is opened per loop entry and closed on
//! every exit path. All failures propagate to the restart supervisor; none
//! are handled here.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    EncodingError, RecordSource, SourceError, StorageWrite, TablePath, WireRecord,
};
use crate::application::session::{AppendSession, SessionError};
use crate::domain::gate::Gate;

/// Failure that unwinds the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source collaborator failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A record could not be encoded. Indicates a logic or data bug.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The sink collaborator failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A subscription feed terminated without error. Treated as a failure
    /// because a live feed is expected to be infinite.
    #[error("subscription feed ended unexpectedly")]
    UnexpectedStreamEnd,

    /// A bounded acquisition or append call ran past its deadline.
    #[error("{stage} exceeded its deadline of {limit:?}")]
    DeadlineExceeded {
        /// Which call timed out.
        stage: &'static str,
        /// The configured deadline.
        limit: Duration,
    },
}

/// Polling-mode pacing: cycle interval plus an optional acquisition gate.
struct Pacing {
    interval: Duration,
    gate: Option<Box<dyn Gate + Send + Sync>>,
}

/// The generic ingestion loop.
///
/// Parameterized by the source adapter capability; the record codec
/// capability rides along as `S::Record: WireRecord`.
pub struct IngestLoop<S: RecordSource> {
    source: S,
    table: TablePath,
    pacing: Option<Pacing>,
    fetch_deadline: Option<Duration>,
    append_deadline: Option<Duration>,
    cancel: CancellationToken,
    last_stamp: Option<DateTime<Utc>>,
}

impl<S: RecordSource> IngestLoop<S> {
    /// Polling mode: fetch the latest snapshot each cycle, sleep `interval`
    /// between cycles, and skip cycles while `gate` (if any) is closed.
    #[must_use]
    pub fn polling(
        source: S,
        table: TablePath,
        interval: Duration,
        gate: Option<Box<dyn Gate + Send + Sync>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            table,
            pacing: Some(Pacing { interval, gate }),
            fetch_deadline: None,
            append_deadline: None,
            cancel,
            last_stamp: None,
        }
    }

    /// Subscription mode: block on the feed, no sleep between cycles.
    #[must_use]
    pub fn subscription(source: S, table: TablePath, cancel: CancellationToken) -> Self {
        Self {
            source,
            table,
            pacing: None,
            fetch_deadline: None,
            append_deadline: None,
            cancel,
            last_stamp: None,
        }
    }

    /// Bound the otherwise-unbounded acquisition and append calls. `None`
    /// leaves a call unbounded.
    #[must_use]
    pub const fn with_deadlines(
        mut self,
        fetch_deadline: Option<Duration>,
        append_deadline: Option<Duration>,
    ) -> Self {
        self.fetch_deadline = fetch_deadline;
        self.append_deadline = append_deadline;
        self
    }

    /// Open one append session and run the cycle until failure or
    /// cancellation. The session is closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`]; cancellation returns `Ok(())`.
    pub async fn run<W: StorageWrite>(mut self, writer: W) -> Result<(), PipelineError> {
        let mut session = AppendSession::open(writer, &self.table, S::Record::descriptor()).await?;
        let result = self.drive(&mut session).await;
        session.close().await;
        result
    }

    async fn drive<W: StorageWrite>(
        &mut self,
        session: &mut AppendSession<W>,
    ) -> Result<(), PipelineError> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("ingestion loop cancelled");
                return Ok(());
            }

            if let Some(pacing) = &self.pacing {
                if let Some(gate) = &pacing.gate {
                    if !gate.is_open(Utc::now()) {
                        tracing::debug!("acquisition window closed; skipping cycle");
                        if !self.sleep_cycle(pacing.interval).await {
                            return Ok(());
                        }
                        continue;
                    }
                }
            }

            let fetch_deadline = self.fetch_deadline;
            let fetched = tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("ingestion loop cancelled while waiting on source");
                    return Ok(());
                }
                result = with_deadline(fetch_deadline, self.source.next_record()) => result,
            };

            let mut record = match fetched {
                Some(Ok(record)) => record,
                Some(Err(SourceError::StreamEnded)) => {
                    return Err(PipelineError::UnexpectedStreamEnd);
                }
                Some(Err(e)) => {
                    metrics::counter!("inflow_source_errors_total").increment(1);
                    return Err(PipelineError::Source(e));
                }
                None => {
                    return Err(PipelineError::DeadlineExceeded {
                        stage: "fetch",
                        limit: fetch_deadline.unwrap_or_default(),
                    });
                }
            };

            record.stamp(next_stamp(&mut self.last_stamp, Utc::now()));
            let row = record.to_row_bytes()?;

            let append_deadline = self.append_deadline;
            let ack = match with_deadline(append_deadline, session.append_one(row)).await {
                Some(result) => result?,
                None => {
                    return Err(PipelineError::DeadlineExceeded {
                        stage: "append",
                        limit: append_deadline.unwrap_or_default(),
                    });
                }
            };

            metrics::counter!("inflow_rows_committed_total").increment(1);
            tracing::info!(offset = ack.offset, rows = ack.row_count, "batch committed");

            if let Some(pacing) = &self.pacing {
                if !self.sleep_cycle(pacing.interval).await {
                    return Ok(());
                }
            }
        }
    }

    /// Sleep one cycle interval. Returns `false` when cancelled.
    async fn sleep_cycle(&self, interval: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(interval) => true,
        }
    }
}

/// Capture stamp for the next record: wall clock, clamped so stamps never
/// run backwards within a session.
fn next_stamp(last: &mut Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let stamp = match *last {
        Some(prev) if prev > now => prev,
        _ => now,
    };
    *last = Some(stamp);
    stamp
}

async fn with_deadline<T>(limit: Option<Duration>, fut: impl Future<Output = T>) -> Option<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
