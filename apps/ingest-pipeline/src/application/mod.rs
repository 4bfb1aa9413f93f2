//! Application Layer
//!
//! Use cases and port definitions. The ingestion loop, the append-stream
//! session, and the restart supervisor are all written against the port
//! traits in [`ports`], never against concrete adapters.

pub mod pipeline;
pub mod ports;
pub mod session;
pub mod supervisor;
