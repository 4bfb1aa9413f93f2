//! Restart Supervisor
//!
//! The outermost recovery point. Every failure in the pipeline - source,
//! encoding, session, unexpected end of feed - propagates here; the
//! supervisor logs the cause and re-enters the pipeline from scratch with a
//! fresh source connection and a fresh append session. No state survives a
//! restart.
//!
//! Restart pacing is a first-class policy rather than a hard-wired loop. The
//! default configuration restarts immediately and without bound, which keeps
//! the pipeline maximally available but will hammer the source and sink
//! collaborators under sustained failure; deployments that care should
//! configure exponential backoff and an attempt cap.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::application::pipeline::PipelineError;

/// Configuration for restart pacing.
#[derive(Debug, Clone)]
pub struct RestartConfig {
    /// Delay before the first restart.
    pub initial_delay: Duration,
    /// Ceiling for the delay between restarts.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each restart.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = +/-10%).
    pub jitter_factor: f64,
    /// Maximum number of restarts (0 = unlimited).
    pub max_restarts: u32,
}

impl Default for RestartConfig {
    /// Immediate, unbounded restarts.
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_restarts: 0,
        }
    }
}

impl RestartConfig {
    /// Create a configuration with custom values.
    #[must_use]
    pub const fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
        max_restarts: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor,
            max_restarts,
        }
    }
}

/// Restart pacing policy: exponential backoff with jitter and an optional
/// attempt cap.
#[derive(Debug)]
pub struct RestartPolicy {
    config: RestartConfig,
    current_delay: Duration,
    restart_count: u32,
}

impl RestartPolicy {
    /// Create a policy from its configuration.
    #[must_use]
    pub const fn new(config: RestartConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            restart_count: 0,
        }
    }

    /// Delay before the next restart, or `None` once the attempt cap is
    /// exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_restarts > 0 && self.restart_count >= self.config.max_restarts {
            return None;
        }

        self.restart_count += 1;

        let delay = self.apply_jitter(self.current_delay);

        // Advance the base delay for subsequent restarts, capped.
        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay)
    }

    /// Number of restarts granted so far.
    #[must_use]
    pub const fn restart_count(&self) -> u32 {
        self.restart_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted = (base_millis + jitter).max(0.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_millis = adjusted as u64;
        Duration::from_millis(adjusted_millis)
    }
}

/// Terminal supervisor failure.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The restart budget ran out.
    #[error("restart budget exhausted after {attempts} attempts: {last}")]
    RestartsExhausted {
        /// Restarts granted before giving up.
        attempts: u32,
        /// The failure that ended the final attempt.
        #[source]
        last: PipelineError,
    },
}

/// Restart-on-failure wrapper around the pipeline entry point.
pub struct Supervisor {
    policy: RestartPolicy,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor with the given pacing and cancellation token.
    #[must_use]
    pub const fn new(config: RestartConfig, cancel: CancellationToken) -> Self {
        Self {
            policy: RestartPolicy::new(config),
            cancel,
        }
    }

    /// Run `pipeline` until it returns `Ok` (cancellation) or the restart
    /// budget is exhausted. Each invocation of the factory must build the
    /// whole pipeline anew - source, session, everything.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::RestartsExhausted`] when a configured
    /// attempt cap runs out.
    pub async fn run<F, Fut>(mut self, mut pipeline: F) -> Result<(), SupervisorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), PipelineError>>,
    {
        loop {
            match pipeline().await {
                Ok(()) => {
                    tracing::info!("pipeline exited cleanly");
                    return Ok(());
                }
                Err(e) => {
                    metrics::counter!("inflow_pipeline_restarts_total").increment(1);
                    tracing::error!(error = %e, "pipeline failed; restarting from a clean state");

                    let Some(delay) = self.policy.next_delay() else {
                        return Err(SupervisorError::RestartsExhausted {
                            attempts: self.policy.restart_count(),
                            last: e,
                        });
                    };

                    if !delay.is_zero() {
                        tracing::info!(
                            attempt = self.policy.restart_count(),
                            delay_ms = delay.as_millis(),
                            "restart delayed"
                        );
                        tokio::select! {
                            () = self.cancel.cancelled() => return Ok(()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }

                    if self.cancel.is_cancelled() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::application::ports::SourceError;

    #[test]
    fn default_policy_is_immediate_and_unbounded() {
        let mut policy = RestartPolicy::new(RestartConfig::default());
        for _ in 0..1000 {
            assert_eq!(policy.next_delay(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn exponential_backoff_sequence() {
        let mut policy = RestartPolicy::new(RestartConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_restarts: 0,
        });

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(800)));
    }

    #[test]
    fn delay_is_capped() {
        let mut policy = RestartPolicy::new(RestartConfig {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
            multiplier: 4.0,
            jitter_factor: 0.0,
            max_restarts: 0,
        });

        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn attempt_cap_exhausts() {
        let mut policy = RestartPolicy::new(RestartConfig {
            max_restarts: 2,
            ..Default::default()
        });

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.restart_count(), 2);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..100 {
            let mut policy = RestartPolicy::new(RestartConfig {
                initial_delay: Duration::from_millis(1000),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
                jitter_factor: 0.1,
                max_restarts: 0,
            });

            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of bounds");
        }
    }

    #[tokio::test]
    async fn restarts_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let supervisor = Supervisor::new(RestartConfig::default(), CancellationToken::new());
        let result = supervisor
            .run(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(PipelineError::Source(SourceError::Fetch("boom".into())))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_error() {
        let supervisor = Supervisor::new(
            RestartConfig {
                max_restarts: 2,
                ..Default::default()
            },
            CancellationToken::new(),
        );

        let result = supervisor
            .run(|| async { Err(PipelineError::UnexpectedStreamEnd) })
            .await;

        match result {
            Err(SupervisorError::RestartsExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, PipelineError::UnexpectedStreamEnd));
            }
            other => panic!("expected exhausted budget, got {other:?}"),
        }
    }
}
