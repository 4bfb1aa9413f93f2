//! Configuration
//!
//! Environment-driven settings, loaded once at process start and immutable
//! afterwards. Credentials never appear in logs or `Debug` output.

mod settings;

pub use settings::{
    ConfigError, DeadlineSettings, EndpointSettings, FeedCredentials, PipelineConfig,
};
