#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Ingest Pipeline - Source-to-Warehouse Stream Writer
//!
//! Continuously pulls records from an external source, serializes each one
//! into a fixed protobuf wire schema, and appends it to a managed append-only
//! remote store through a long-lived committed-mode write stream.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Records and pure policy
//!   - `record`: Ingested record value objects (market snapshots, feed items)
//!   - `gate`: Market-hours acquisition gate
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for record sources, wire encoding, and the sink
//!   - `session`: Lifecycle of one committed write stream
//!   - `pipeline`: The fetch -> encode -> append ingestion loop
//!   - `supervisor`: Restart-on-failure wrapper with a pluggable policy
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `codec`: Protobuf row types and schema descriptors
//!   - `source`: Polling (HTTP) and subscription (WebSocket) source adapters
//!   - `sink`: gRPC `StorageWrite` transport adapter
//!   - `config`: Environment-driven configuration
//!   - `telemetry`: Tracing subscriber setup
//!   - `metrics`: Prometheus counters
//!
//! # Data Flow
//!
//! ```text
//! Snapshot HTTP --(poll + gate)--+
//!                                +--> IngestLoop --> AppendSession --> StorageWrite gRPC
//! Feed WebSocket --(subscribe)---+         ^
//!                                          |
//!                                   RestartSupervisor
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Record value objects and pure acquisition policy.
pub mod domain;

/// Application layer - Ports, session lifecycle, ingestion loop, supervision.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::gate::{Gate, TradingGate};
pub use domain::record::{FeedItemRecord, MarketSnapshotRecord};

// Application ports and services
pub use application::pipeline::{IngestLoop, PipelineError};
pub use application::ports::{
    AppendAck, AppendBatch, EncodingError, RecordSource, SinkError, SourceError, StorageWrite,
    StreamRef, TablePath, WireRecord,
};
pub use application::session::{AppendSession, SessionError};
pub use application::supervisor::{RestartConfig, RestartPolicy, Supervisor, SupervisorError};

// Infrastructure config
pub use infrastructure::config::{FeedCredentials, PipelineConfig};

// Source adapters
pub use infrastructure::source::bars::{BarPoller, BarPollerConfig};
pub use infrastructure::source::firehose::{FeedSubscriber, FeedSubscriberConfig};

// Sink adapter (and wire rows, for test decoding)
pub use infrastructure::codec::{FeedItemRow, SnapshotRow};
pub use infrastructure::sink::remote::{RemoteConfig, RemoteStorageWriter};

// Metrics
pub use infrastructure::metrics::init_metrics;
