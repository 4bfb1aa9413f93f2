//! Infrastructure Layer
//!
//! Adapters and external integrations: wire codec, source adapters, the
//! gRPC sink transport, configuration, and telemetry.

pub mod codec;
pub mod config;
pub mod metrics;
pub mod sink;
pub mod source;
pub mod telemetry;
