//! Background certificate scheduler
//!
//! Periodically runs the certificate strategy.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant};
use tracing::{debug, error, info};

use super::strategy::{CertificateDecision, CertificateStrategy};

/// Default check interval (12 hours)
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Minimum check interval (1 minute)
const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background certificate scheduler
///
/// Runs the certificate strategy once on start and then at the configured
/// interval. A failed cycle is logged and the next one runs as scheduled.
pub struct CertificateScheduler {
    strategy: Arc<CertificateStrategy>,
    check_interval: Duration,
}

impl CertificateScheduler {
    pub fn new(strategy: Arc<CertificateStrategy>) -> Self {
        Self {
            strategy,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Set the check interval
    ///
    /// The interval is clamped to a minimum of 1 minute.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Run the scheduler loop
    ///
    /// This runs indefinitely.
    pub async fn run(self) {
        info!(
            check_interval_secs = self.check_interval.as_secs(),
            "Starting certificate scheduler"
        );

        let mut interval = interval(self.check_interval);

        loop {
            interval.tick().await;
            debug!("Running scheduled certificate check");
            self.check().await;
        }
    }

    /// Run a single cycle, logging the outcome
    pub async fn check(&self) -> Option<CertificateDecision> {
        let start = Instant::now();

        match self.strategy.run().await {
            Ok(decision) => {
                debug!(
                    decision = ?decision,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Certificate check completed"
                );
                Some(decision)
            }
            Err(e) => {
                error!(error = %e, "Certificate check failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for CertificateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateScheduler")
            .field("check_interval", &self.check_interval)
            .finish()
    }
}
