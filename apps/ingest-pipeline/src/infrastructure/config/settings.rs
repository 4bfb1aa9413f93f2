//! Pipeline Configuration Settings
//!
//! Everything here comes from the process environment (a `.env` file is
//! loaded by the binary before parsing). Identifiers for the source and the
//! destination table arrive on the command line instead; nothing below
//! affects core semantics beyond endpoints, deadlines, and restart pacing.

use std::time::Duration;

use crate::application::supervisor::RestartConfig;
use crate::infrastructure::source::bars::DEFAULT_CHART_BASE_URL;

/// Credentials for the subscription feed.
///
/// Consumed only while constructing the feed adapter; the ingestion core
/// never sees them.
#[derive(Clone)]
pub struct FeedCredentials {
    client_id: String,
    client_secret: String,
}

impl FeedCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    /// Get the client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl std::fmt::Debug for FeedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCredentials")
            .field("client_id", &"[REDACTED]")
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Collaborator endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// gRPC endpoint of the remote store's `StorageWrite` service.
    pub storage_endpoint: String,
    /// Chart API host for the polling source.
    pub chart_base_url: String,
    /// WebSocket endpoint of the subscription feed. Required in feed mode.
    pub feed_url: Option<String>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            storage_endpoint: "http://localhost:50051".to_string(),
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            feed_url: None,
        }
    }
}

/// Deadlines for the otherwise-unbounded acquisition and append calls.
/// Unset means unbounded, which matches the historical behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineSettings {
    /// Bound on one source fetch / next-item wait.
    pub fetch: Option<Duration>,
    /// Bound on one append round-trip.
    pub append: Option<Duration>,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Collaborator endpoints.
    pub endpoints: EndpointSettings,
    /// Feed credentials, when the deployment streams a subscription feed.
    pub feed_credentials: Option<FeedCredentials>,
    /// Call deadlines.
    pub deadlines: DeadlineSettings,
    /// Restart pacing for the supervisor.
    pub restart: RestartConfig,
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when feed credentials are half-set or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoints = EndpointSettings {
            storage_endpoint: parse_env_string(
                "INFLOW_STORAGE_ENDPOINT",
                &EndpointSettings::default().storage_endpoint,
            ),
            chart_base_url: parse_env_string("INFLOW_CHART_BASE_URL", DEFAULT_CHART_BASE_URL),
            feed_url: std::env::var("INFLOW_FEED_URL").ok().filter(|v| !v.is_empty()),
        };

        let feed_credentials = feed_credentials_from_env()?;

        let deadlines = DeadlineSettings {
            fetch: parse_env_opt_duration_secs("INFLOW_FETCH_DEADLINE_SECS"),
            append: parse_env_opt_duration_secs("INFLOW_APPEND_DEADLINE_SECS"),
        };

        let restart_defaults = RestartConfig::default();
        let restart = RestartConfig {
            initial_delay: parse_env_duration_millis(
                "INFLOW_RESTART_DELAY_INITIAL_MS",
                restart_defaults.initial_delay,
            ),
            max_delay: parse_env_duration_secs(
                "INFLOW_RESTART_DELAY_MAX_SECS",
                restart_defaults.max_delay,
            ),
            multiplier: parse_env_f64("INFLOW_RESTART_MULTIPLIER", restart_defaults.multiplier),
            jitter_factor: parse_env_f64("INFLOW_RESTART_JITTER", restart_defaults.jitter_factor),
            max_restarts: parse_env_u32("INFLOW_MAX_RESTARTS", restart_defaults.max_restarts),
        };

        Ok(Self {
            endpoints,
            feed_credentials,
            deadlines,
            restart,
        })
    }
}

fn feed_credentials_from_env() -> Result<Option<FeedCredentials>, ConfigError> {
    let client_id = std::env::var("FEED_CLIENT_ID").ok();
    let client_secret = std::env::var("FEED_CLIENT_SECRET").ok();

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => {
            if id.is_empty() {
                return Err(ConfigError::EmptyValue("FEED_CLIENT_ID".to_string()));
            }
            if secret.is_empty() {
                return Err(ConfigError::EmptyValue("FEED_CLIENT_SECRET".to_string()));
            }
            Ok(Some(FeedCredentials::new(id, secret)))
        }
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingEnvVar("FEED_CLIENT_SECRET".to_string())),
        (None, Some(_)) => Err(ConfigError::MissingEnvVar("FEED_CLIENT_ID".to_string())),
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_env_opt_duration_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_redacted_debug() {
        let creds = FeedCredentials::new("id123".to_string(), "secret456".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("id123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn endpoint_defaults() {
        let endpoints = EndpointSettings::default();
        assert_eq!(endpoints.storage_endpoint, "http://localhost:50051");
        assert_eq!(endpoints.chart_base_url, DEFAULT_CHART_BASE_URL);
        assert!(endpoints.feed_url.is_none());
    }

    #[test]
    fn deadline_defaults_are_unbounded() {
        let deadlines = DeadlineSettings::default();
        assert!(deadlines.fetch.is_none());
        assert!(deadlines.append.is_none());
    }

    #[test]
    fn parse_helpers_fall_back_on_missing_keys() {
        assert_eq!(parse_env_string("INFLOW_TEST_UNSET_STRING", "dflt"), "dflt");
        assert_eq!(parse_env_u32("INFLOW_TEST_UNSET_U32", 7), 7);
        assert!((parse_env_f64("INFLOW_TEST_UNSET_F64", 1.5) - 1.5).abs() < f64::EPSILON);
        assert_eq!(
            parse_env_duration_secs("INFLOW_TEST_UNSET_SECS", Duration::from_secs(3)),
            Duration::from_secs(3)
        );
        assert!(parse_env_opt_duration_secs("INFLOW_TEST_UNSET_OPT").is_none());
    }
}
