//! Background certificate renewal scheduler
//!
//! Checks the certificate at a fixed delay and notifies the service after a
//! new bundle was written.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::error::CertificateError;
use super::lifecycle::CertificateLifecycleManager;
use crate::reload::ReloadTarget;

/// Default check interval (24 hours)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Minimum check interval (1 hour)
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Background certificate renewal scheduler
pub struct RenewalScheduler {
    manager: Arc<CertificateLifecycleManager>,
    target: Arc<dyn ReloadTarget>,
    threshold_days: i64,
    check_interval: Duration,
}

impl RenewalScheduler {
    pub fn new(
        manager: Arc<CertificateLifecycleManager>,
        target: Arc<dyn ReloadTarget>,
        threshold_days: i64,
    ) -> Self {
        Self {
            manager,
            target,
            threshold_days,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Set the check interval
    ///
    /// The interval is clamped to a minimum of 1 hour.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Run one check, notifying the target when the bundle changed
    ///
    /// A failed notification is logged; the bundle is written either way.
    pub async fn check_once(&self) -> Result<bool, CertificateError> {
        debug!(threshold_days = self.threshold_days, "Running certificate check");

        let changed = self.manager.ensure_valid(self.threshold_days).await?;
        if changed {
            match self.target.reload().await {
                Ok(()) => info!(service = %self.target.describe(), "Service notified of new certificate"),
                Err(e) => error!(
                    service = %self.target.describe(),
                    error = %e,
                    "Failed to notify service of new certificate"
                ),
            }
        }
        Ok(changed)
    }

    /// Check forever, sleeping `check_interval` before each check
    ///
    /// Returns only when a check fails in a way the next one cannot fix.
    pub async fn run(self) -> Result<(), CertificateError> {
        info!(
            check_interval_hours = self.check_interval.as_secs() / 3600,
            threshold_days = self.threshold_days,
            "Starting certificate renewal scheduler"
        );

        loop {
            tokio::time::sleep(self.check_interval).await;

            match self.check_once().await {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Certificate renewal check failed, retrying at next interval");
                }
                Err(e) => {
                    error!(error = %e, "Certificate renewal failed, stopping scheduler");
                    return Err(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for RenewalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalScheduler")
            .field("target", &self.target.describe())
            .field("threshold_days", &self.threshold_days)
            .field("check_interval", &self.check_interval)
            .finish()
    }
}
