//! DNS-01 challenge solving
//!
//! Records are published for every pending authorization first, then the
//! solver waits until each is visible. Whatever happens afterwards, every
//! published record must be handed back to [`Dns01Solver::cleanup_all`].

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::propagation::PropagationChecker;
use super::provider::{
    challenge_record_fqdn, normalize_domain, DnsProvider, DnsResult, ACME_CHALLENGE_RECORD,
};

/// A challenge record published at the DNS provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedRecord {
    /// Domain being validated, possibly a wildcard
    pub domain: String,
    /// `_acme-challenge.{domain}` without the wildcard label
    pub record_name: String,
    /// TXT value
    pub record_value: String,
    /// Provider identifier used for deletion
    pub record_id: String,
}

/// Publishes, verifies and removes DNS-01 challenge records
#[derive(Debug)]
pub struct Dns01Solver {
    provider: Arc<dyn DnsProvider>,
    checker: PropagationChecker,
}

impl Dns01Solver {
    pub fn new(provider: Arc<dyn DnsProvider>, checker: PropagationChecker) -> Self {
        Self { provider, checker }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// base64url (unpadded) SHA-256 digest of the key authorization
    pub fn compute_challenge_value(key_authorization: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes()))
    }

    /// Create the challenge TXT record for `domain`
    pub async fn present(&self, domain: &str, key_authorization: &str) -> DnsResult<PresentedRecord> {
        let record_name = challenge_record_fqdn(domain);
        let record_value = Self::compute_challenge_value(key_authorization);

        info!(
            domain = %domain,
            record = %record_name,
            provider = self.provider.name(),
            "Creating DNS-01 challenge record"
        );

        let record_id = self
            .provider
            .create_txt_record(normalize_domain(domain), ACME_CHALLENGE_RECORD, &record_value)
            .await?;

        debug!(domain = %domain, record_id = %record_id, "Challenge record created");

        Ok(PresentedRecord {
            domain: domain.to_string(),
            record_name,
            record_value,
            record_id,
        })
    }

    /// Wait until the record is visible to the configured resolvers
    pub async fn await_propagation(&self, record: &PresentedRecord) -> DnsResult<()> {
        self.checker
            .wait_for_propagation(&record.domain, &record.record_value)
            .await?;
        info!(domain = %record.domain, "DNS-01 challenge record propagated");
        Ok(())
    }

    /// Delete one challenge record
    pub async fn cleanup(&self, record: &PresentedRecord) -> DnsResult<()> {
        self.provider
            .delete_txt_record(normalize_domain(&record.domain), &record.record_id)
            .await?;
        debug!(domain = %record.domain, record_id = %record.record_id, "Challenge record removed");
        Ok(())
    }

    /// Delete every record, logging failures without stopping
    pub async fn cleanup_all(&self, records: &[PresentedRecord]) {
        for record in records {
            if let Err(e) = self.cleanup(record).await {
                warn!(
                    domain = %record.domain,
                    record_id = %record.record_id,
                    error = %e,
                    "Failed to clean up challenge record"
                );
            }
        }
    }
}
