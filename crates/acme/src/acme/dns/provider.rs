//! DNS provider trait for DNS-01 challenges

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Result type for DNS operations
pub type DnsResult<T> = Result<T, DnsProviderError>;

/// Errors that can occur during DNS provider operations
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// Authentication failed with the DNS provider
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Zone not found for the domain
    #[error("Zone not found for domain '{domain}'")]
    ZoneNotFound { domain: String },

    /// Record creation failed
    #[error("Failed to create TXT record for '{record_name}': {message}")]
    RecordCreation { record_name: String, message: String },

    /// Record deletion failed
    #[error("Failed to delete TXT record '{record_id}': {message}")]
    RecordDeletion { record_id: String, message: String },

    /// API request failed
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Rate limited by provider
    #[error("Rate limited by DNS provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Request or propagation timeout
    #[error("Timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// A DNS hosting service able to publish challenge records
#[async_trait]
pub trait DnsProvider: Send + Sync + Debug {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Create the TXT record `{record_name}.{domain}` holding `record_value`
    ///
    /// Returns an identifier for [`delete_txt_record`](Self::delete_txt_record).
    async fn create_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
    ) -> DnsResult<String>;

    /// Delete a record created by [`create_txt_record`](Self::create_txt_record)
    ///
    /// Deleting a record that no longer exists succeeds.
    async fn delete_txt_record(&self, domain: &str, record_id: &str) -> DnsResult<()>;
}

/// ACME challenge record name prefix
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// TTL for challenge records, in seconds
pub const CHALLENGE_TTL: u32 = 60;

/// Strip the wildcard label, `*.example.com` becomes `example.com`
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Full challenge record name, `_acme-challenge.example.com` for
/// `example.com` and `*.example.com` alike
pub fn challenge_record_fqdn(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_RECORD, normalize_domain(domain))
}
