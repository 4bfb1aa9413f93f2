//! Tracing Setup
//!
//! Installs the global tracing subscriber. Log level defaults to `info` for
//! this crate and is overridable through `RUST_LOG`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing. Call once at startup, before any spans or events.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env().add_directive(
        "ingest_pipeline=info"
            .parse()
            .expect("static directive 'ingest_pipeline=info' is valid"),
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
