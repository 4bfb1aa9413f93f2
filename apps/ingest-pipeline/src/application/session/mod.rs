//! Append Stream Session
//!
//! Owns the lifecycle of one committed-mode write stream:
//!
//! ```text
//! Uninitialized -> Open -> (Appending)* -> Closed
//! ```
//!
//! `Closed` is reachable from any state; [`AppendSession::close`] is
//! idempotent and must run on every exit path, which the ingestion loop
//! guarantees by scoping the session around its run body. The stream handle
//! is owned exclusively for the whole session and never crosses sessions.
//!
//! The schema descriptor is registered with the remote store exactly once,
//! on the first batch (request-template semantics); every later batch
//! carries rows only.

use prost_types::DescriptorProto;
use uuid::Uuid;

use crate::application::ports::{AppendAck, AppendBatch, SinkError, StorageWrite, StreamRef, TablePath};

/// Failure in the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Stream creation was rejected or the endpoint was unreachable.
    #[error("failed to open write stream: {0}")]
    Open(SinkError),

    /// A batch was not acknowledged. Transient; the session does not retry -
    /// the supervisor restarts the whole pipeline instead.
    #[error("append failed: {0}")]
    Append(SinkError),

    /// The session was already closed.
    #[error("session already closed")]
    Closed,
}

/// One open write-stream session against the remote store.
pub struct AppendSession<W: StorageWrite> {
    writer: W,
    stream: StreamRef,
    pending_schema: Option<DescriptorProto>,
    closed: bool,
    session_id: Uuid,
}

impl<W: StorageWrite> AppendSession<W> {
    /// Create a committed-mode write stream and hold the schema for the
    /// first batch.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Open`] when stream creation fails.
    pub async fn open(
        mut writer: W,
        table: &TablePath,
        descriptor: DescriptorProto,
    ) -> Result<Self, SessionError> {
        let stream = writer
            .create_stream(table)
            .await
            .map_err(SessionError::Open)?;

        let session_id = Uuid::new_v4();
        tracing::info!(
            session_id = %session_id,
            stream = %stream.name,
            table = %table.parent(),
            "write stream created"
        );

        Ok(Self {
            writer,
            stream,
            pending_schema: Some(descriptor),
            closed: false,
            session_id,
        })
    }

    /// Append a batch of exactly one row and block until its acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Append`] when the batch is rejected and
    /// [`SessionError::Closed`] after [`close`](Self::close).
    pub async fn append_one(&mut self, row: Vec<u8>) -> Result<AppendAck, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        let batch = AppendBatch {
            writer_schema: self.pending_schema.take(),
            rows: vec![row],
        };

        self.writer
            .append(&self.stream, batch)
            .await
            .map_err(SessionError::Append)
    }

    /// Release the remote stream. Idempotent; safe to call after an error.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.writer.close_stream(&self.stream).await {
            // Teardown is best-effort; the supervisor discards this session
            // either way.
            tracing::warn!(
                session_id = %self.session_id,
                stream = %self.stream.name,
                error = %e,
                "write stream close failed"
            );
        } else {
            tracing::info!(
                session_id = %self.session_id,
                stream = %self.stream.name,
                "write stream closed"
            );
        }
    }

    /// Resource name of the owned stream.
    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream.name
    }
}
