//! Certificate lifecycle decisions
//!
//! [`CertificateLifecycleManager::ensure_valid`] looks at the bundle on disk
//! and issues a new certificate when none is usable or the current one is
//! about to expire. The state is derived from the file on every call.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use certsmith_config::ResolvedConfiguration;

use super::client::AcmeIssuer;
use super::error::{AcmeError, CertificateError};
use super::issuer::CertificateIssuer;
use super::storage::BundleStore;

/// State of the stored certificate relative to a freshness threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateState {
    /// No usable certificate on disk
    Absent,
    /// Still valid for longer than the threshold
    Valid { days_remaining: i64 },
    /// Expiring within the threshold (or already expired)
    NeedsRenewal { days_remaining: i64 },
    /// The bundle starts with a CA certificate
    InvalidChain,
}

/// Keeps one certificate bundle valid
#[derive(Debug)]
pub struct CertificateLifecycleManager {
    issuer: Arc<dyn CertificateIssuer>,
    store: BundleStore,
    domains: Vec<String>,
    /// Held for the whole of `ensure_valid`; tracks account registration
    registered: Mutex<bool>,
}

impl CertificateLifecycleManager {
    pub fn new(issuer: Arc<dyn CertificateIssuer>, store: BundleStore, domains: Vec<String>) -> Self {
        Self {
            issuer,
            store,
            domains,
            registered: Mutex::new(false),
        }
    }

    /// Manager backed by the ACME issuer described by `config`
    pub async fn from_config(config: &ResolvedConfiguration) -> Result<Self, AcmeError> {
        let issuer = AcmeIssuer::from_config(config).await?;
        let store = BundleStore::new(&config.output_directory, &config.artifact_name);
        Ok(Self::new(Arc::new(issuer), store, config.domains.clone()))
    }

    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Classify the stored certificate against `threshold_days`
    ///
    /// A negative threshold never asks for renewal of a present certificate.
    pub fn classify(&self, threshold_days: i64) -> CertificateState {
        let leaf = match self.store.load_leaf() {
            None => return CertificateState::Absent,
            Some(Err(e)) => {
                warn!(
                    path = %self.store.certificate_path().display(),
                    error = %e,
                    "Stored certificate is unparsable, treating it as absent"
                );
                return CertificateState::Absent;
            }
            Some(Ok(leaf)) => leaf,
        };

        if leaf.is_ca {
            return CertificateState::InvalidChain;
        }

        let days_remaining = leaf.days_remaining(Utc::now());
        if threshold_days < 0 || days_remaining > threshold_days {
            CertificateState::Valid { days_remaining }
        } else {
            CertificateState::NeedsRenewal { days_remaining }
        }
    }

    /// Make sure a certificate valid for more than `threshold_days` is stored
    ///
    /// Returns `true` when a new bundle was written.
    pub async fn ensure_valid(&self, threshold_days: i64) -> Result<bool, CertificateError> {
        let mut registered = self.registered.lock().await;

        match self.classify(threshold_days) {
            CertificateState::InvalidChain => {
                return Err(CertificateError::InvalidChain {
                    path: self.store.certificate_path(),
                });
            }
            CertificateState::Valid { days_remaining } => {
                info!(
                    days_remaining,
                    threshold_days,
                    "Skipping TLS certificate request, certificate is still valid"
                );
                return Ok(false);
            }
            CertificateState::NeedsRenewal { days_remaining } => {
                info!(days_remaining, threshold_days, "Certificate needs renewal");
            }
            CertificateState::Absent => {
                info!(
                    path = %self.store.certificate_path().display(),
                    "No certificate found, requesting a new one"
                );
            }
        }

        if !*registered {
            self.issuer
                .register()
                .await
                .map_err(CertificateError::Registration)?;
            *registered = true;
            debug!("ACME account registered");
        }

        let issued = self
            .issuer
            .obtain(&self.domains)
            .await
            .map_err(CertificateError::CertificateRequestFailed)?;

        self.store
            .save(&issued)
            .map_err(|source| CertificateError::PersistenceFailed {
                inconsistent: source.is_inconsistent(),
                source,
            })?;

        info!(domains = ?self.domains, "Certificate issued and stored");
        Ok(true)
    }
}
