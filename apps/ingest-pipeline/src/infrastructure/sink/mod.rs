//! Append Sink
//!
//! Transport to the remote append-only store. The wire contract lives in
//! [`proto`] (the `inflow.v1.StorageWrite` service); [`remote`] adapts it to
//! the [`StorageWrite`](crate::application::ports::StorageWrite) port.

pub mod remote;

// Wire contract for the remote store. Kept in the shape `tonic-prost-build`
// emits so the module can be swapped for build-time codegen if the service
// surface ever grows.
#[allow(
    missing_docs,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto;
