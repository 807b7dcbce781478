//! Certificate lifecycle error types

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::dns::DnsProviderError;

/// Errors reported by [`CertificateLifecycleManager`](super::CertificateLifecycleManager)
///
/// Only `CertificateRequestFailed` and a consistent `PersistenceFailed` are
/// recoverable: the previous bundle is still in place and the next check
/// tries again.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The first certificate of the bundle is a CA certificate
    #[error("Certificate bundle {} starts with a CA certificate", path.display())]
    InvalidChain { path: PathBuf },

    /// The ACME account could not be registered
    #[error("ACME account registration failed: {0}")]
    Registration(#[source] AcmeError),

    /// The CA did not deliver a certificate
    #[error("Certificate request failed: {0}")]
    CertificateRequestFailed(#[source] AcmeError),

    /// The issued certificate could not be written
    #[error("Failed to persist certificate bundle: {source}")]
    PersistenceFailed {
        /// Some bundle files were replaced and others were not
        inconsistent: bool,
        #[source]
        source: StorageError,
    },
}

impl CertificateError {
    /// Whether the renewal loop can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            CertificateError::CertificateRequestFailed(_) => true,
            CertificateError::PersistenceFailed { inconsistent, .. } => !inconsistent,
            CertificateError::InvalidChain { .. } | CertificateError::Registration(_) => false,
        }
    }
}

/// Errors that can occur while talking to the ACME server
#[derive(Debug, Error)]
pub enum AcmeError {
    /// No ACME account has been registered yet
    #[error("ACME account not registered - call register() first")]
    NoAccount,

    /// Failed to create the ACME account
    #[error("Failed to create ACME account: {0}")]
    AccountCreation(String),

    /// The account key cannot be used with the ACME client
    #[error("Unsupported account key: {0}")]
    UnsupportedAccountKey(String),

    /// Failed to create the certificate order
    #[error("Failed to create certificate order: {0}")]
    OrderCreation(String),

    /// Challenge validation failed
    #[error("Challenge validation failed for domain '{domain}': {message}")]
    ChallengeValidation { domain: String, message: String },

    /// No DNS-01 challenge offered for the domain
    #[error("No DNS-01 challenge available for domain '{0}'")]
    NoDns01Challenge(String),

    /// Certificate key or CSR generation failed
    #[error("Failed to generate certificate key: {0}")]
    KeyGeneration(String),

    /// Certificate finalization failed
    #[error("Failed to finalize certificate: {0}")]
    Finalization(String),

    /// The certificate returned by the CA could not be parsed
    #[error("Failed to parse certificate: {0}")]
    CertificateParse(String),

    /// ACME protocol error from instant-acme
    #[error("ACME protocol error: {0}")]
    Protocol(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// DNS provider operation failed
    #[error("DNS provider error: {0}")]
    DnsProvider(#[from] DnsProviderError),

    /// DNS propagation timeout
    #[error("DNS propagation timeout for record '{record}' after {elapsed:?}")]
    PropagationTimeout { record: String, elapsed: Duration },
}

impl From<instant_acme::Error> for AcmeError {
    fn from(e: instant_acme::Error) -> Self {
        AcmeError::Protocol(e.to_string())
    }
}

/// Errors specific to bundle persistence
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing a temporary file failed, the previous bundle is untouched
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Moving a file into place failed after other files were replaced
    #[error("Failed to replace {} (bundle left inconsistent): {source}", path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Whether the bundle on disk mixes old and new files
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, StorageError::Replace { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(CertificateError::CertificateRequestFailed(AcmeError::NoAccount).is_recoverable());
        assert!(CertificateError::PersistenceFailed {
            inconsistent: false,
            source: StorageError::Write {
                path: PathBuf::from("/tmp/x"),
                source: io_error(),
            },
        }
        .is_recoverable());

        assert!(!CertificateError::InvalidChain {
            path: PathBuf::from("/tmp/x.crt")
        }
        .is_recoverable());
        assert!(!CertificateError::Registration(AcmeError::NoAccount).is_recoverable());
        assert!(!CertificateError::PersistenceFailed {
            inconsistent: true,
            source: StorageError::Replace {
                path: PathBuf::from("/tmp/x"),
                source: io_error(),
            },
        }
        .is_recoverable());
    }

    #[test]
    fn test_persistence_message_flags_inconsistency() {
        let err = CertificateError::PersistenceFailed {
            inconsistent: true,
            source: StorageError::Replace {
                path: PathBuf::from("/certs/example.com.key"),
                source: io_error(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("inconsistent"));
        assert!(msg.contains("/certs/example.com.key"));
    }

    #[test]
    fn test_invalid_chain_message() {
        let err = CertificateError::InvalidChain {
            path: PathBuf::from("/certs/example.com.crt"),
        };
        assert_eq!(
            err.to_string(),
            "Certificate bundle /certs/example.com.crt starts with a CA certificate"
        );
    }
}
