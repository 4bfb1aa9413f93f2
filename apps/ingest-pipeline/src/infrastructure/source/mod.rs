//! Source Adapters
//!
//! Implementations of the [`RecordSource`](crate::application::ports::RecordSource)
//! port: [`bars`] polls an HTTP snapshot endpoint for the latest price bar;
//! [`firehose`] consumes an open-ended WebSocket subscription feed.

pub mod bars;
pub mod firehose;
