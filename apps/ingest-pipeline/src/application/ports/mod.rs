//! Port Interfaces
//!
//! Contracts between the ingestion core and its collaborators, following the
//! Hexagonal Architecture pattern. Infrastructure adapters implement these;
//! tests substitute fakes.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`RecordSource`]: acquisition of the next raw record, by polling or by
//!   consuming a subscription feed
//! - [`StorageWrite`]: transport to the remote append-only store
//!
//! ## Capability Traits
//!
//! - [`WireRecord`]: schema-bound serialization of a record into one wire row

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prost_types::DescriptorProto;

// =============================================================================
// Record Encoding
// =============================================================================

/// A record that serializes into the registered wire schema.
///
/// Encoding is deterministic and total over valid record values; the schema
/// descriptor is derivable without an instance so a session can register it
/// before the first row is produced.
pub trait WireRecord: Send + 'static {
    /// Protobuf descriptor for this record's wire row, registered with the
    /// remote store once per session.
    fn descriptor() -> DescriptorProto;

    /// Set the capture timestamp. Called by the ingestion loop, which owns
    /// the monotonicity guarantee.
    fn stamp(&mut self, ingested_at: DateTime<Utc>);

    /// Serialize into one wire row.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when a field cannot be represented in the
    /// wire schema (non-finite price, negative volume, empty identifier).
    fn to_row_bytes(&self) -> Result<Vec<u8>, EncodingError>;
}

/// A record field cannot be represented in the wire schema.
///
/// Always a logic or data bug, never retried.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// A price field is NaN or infinite.
    #[error("field {field} is not a finite number: {value}")]
    NonFinitePrice {
        /// Wire name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Volume is negative.
    #[error("volume must be non-negative, got {0}")]
    NegativeVolume(i64),

    /// A required identifier is empty.
    #[error("field {0} must not be empty")]
    EmptyField(&'static str),
}

// =============================================================================
// Record Acquisition
// =============================================================================

/// Acquisition of the next raw record.
///
/// The polling variant performs one snapshot query per call; the subscription
/// variant blocks on a persistent connection until an event arrives. Neither
/// retries internally - failures propagate to the caller, and the restart
/// supervisor is the single recovery point.
#[async_trait]
pub trait RecordSource: Send {
    /// The record variant this source produces.
    type Record: WireRecord;

    /// Block until the next record is available.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on fetch or connection failure, and
    /// [`SourceError::StreamEnded`] when a subscription terminates cleanly.
    async fn next_record(&mut self) -> Result<Self::Record, SourceError>;
}

/// Failure acquiring a record from the source collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection establishment or handshake failed.
    #[error("source connection failed: {0}")]
    Connect(String),

    /// A fetch or read against an established connection failed.
    #[error("source fetch failed: {0}")]
    Fetch(String),

    /// The source returned a payload the adapter could not interpret.
    #[error("source payload malformed: {0}")]
    Payload(String),

    /// A subscription feed ended without error. The feed is expected to be
    /// infinite, so the ingestion loop treats this as a failure.
    #[error("subscription stream ended")]
    StreamEnded,
}

// =============================================================================
// Append Transport
// =============================================================================

/// Coordinates of the destination table at the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath {
    /// Project identifier.
    pub project: String,
    /// Dataset identifier.
    pub dataset: String,
    /// Table identifier.
    pub table: String,
}

impl TablePath {
    /// Create a table path from its three coordinates.
    #[must_use]
    pub const fn new(project: String, dataset: String, table: String) -> Self {
        Self {
            project,
            dataset,
            table,
        }
    }

    /// Resource name used as the parent of created write streams.
    #[must_use]
    pub fn parent(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables/{}",
            self.project, self.dataset, self.table
        )
    }
}

/// Handle to one remote write stream, valid for a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef {
    /// Server-assigned stream resource name.
    pub name: String,
}

/// One batch of serialized rows, in append order.
///
/// The first batch of a session carries the writer schema; later batches
/// omit it (request-template semantics at the remote store).
#[derive(Debug, Clone)]
pub struct AppendBatch {
    /// Schema descriptor, present on the first batch of a session only.
    pub writer_schema: Option<DescriptorProto>,
    /// Serialized rows. This pipeline always sends exactly one.
    pub rows: Vec<Vec<u8>>,
}

/// Acknowledgment of one committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendAck {
    /// Offset of the batch within the stream.
    pub offset: i64,
    /// Number of rows committed by the batch.
    pub row_count: i64,
}

/// Failure from the sink collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Transport could not be established.
    #[error("sink transport unavailable: {0}")]
    Transport(String),

    /// The remote store rejected stream creation.
    #[error("write stream creation failed: {0}")]
    CreateStream(String),

    /// A batch was not acknowledged.
    #[error("append rejected: {message}")]
    Append {
        /// Failure detail from the remote store.
        message: String,
    },

    /// Stream release failed.
    #[error("write stream close failed: {0}")]
    CloseStream(String),
}

/// Transport to the remote append-only store.
///
/// Create a stream, append acknowledged batches to it, release it. The
/// session layer owns ordering and schema-once semantics; implementations
/// only move bytes and acks.
#[async_trait]
pub trait StorageWrite: Send {
    /// Request creation of one committed-mode write stream under `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the endpoint is unreachable or rejects the
    /// table reference.
    async fn create_stream(&mut self, table: &TablePath) -> Result<StreamRef, SinkError>;

    /// Send one batch and block until that batch's acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the batch is rejected or the stream is
    /// gone. Never retried here - the caller decides whether to retry the
    /// whole session.
    async fn append(&mut self, stream: &StreamRef, batch: AppendBatch)
    -> Result<AppendAck, SinkError>;

    /// Release the remote stream and any background transport resources.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the release round-trip fails; callers on
    /// teardown paths may log and discard it.
    async fn close_stream(&mut self, stream: &StreamRef) -> Result<(), SinkError>;
}
