//! Configuration errors
//!
//! Every variant names the option the operator has to fix. All of them are
//! fatal: the daemon must not start with an invalid configuration.

use std::path::PathBuf;

use certsmith_common::SecretError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("A comma-separated list of domain names must be provided through DOMAINS environment variable")]
    #[diagnostic(code(certsmith::config::missing_domains))]
    MissingDomains,

    #[error("Invalid domain '{domain}': {reason}")]
    #[diagnostic(
        code(certsmith::config::invalid_domain),
        help("set FILENAME explicitly or fix the first entry of DOMAINS")
    )]
    InvalidDomain { domain: String, reason: String },

    #[error("An email must be provided through ACCOUNT_EMAIL environment variable")]
    #[diagnostic(code(certsmith::config::missing_email))]
    MissingEmail,

    #[error("It is mandatory to agree to Let's Encrypt Terms of Service through LE_TOS_AGREED environment variable (got '{value}')")]
    #[diagnostic(code(certsmith::config::terms_not_accepted))]
    TermsNotAccepted { value: String },

    #[error("Unknown private key type '{block}' in {}", path.display())]
    #[diagnostic(
        code(certsmith::config::unknown_key_format),
        help("ACCOUNT_KEY_FILE must hold an RSA PRIVATE KEY, EC PRIVATE KEY or PRIVATE KEY block")
    )]
    UnknownKeyFormat { path: PathBuf, block: String },

    #[error("Invalid account key in {}: {reason}", path.display())]
    #[diagnostic(code(certsmith::config::invalid_account_key))]
    InvalidAccountKey { path: PathBuf, reason: String },

    #[error("Invalid CA directory: {value}")]
    #[diagnostic(
        code(certsmith::config::invalid_ca_directory),
        help("CA_DIR accepts STAGING, PRODUCTION, TEST or an http(s) URL")
    )]
    InvalidCADirectory { value: String },

    #[error("Invalid key type. Allowed values are 'RSA2048', 'RSA4096' and 'RSA8192'.")]
    #[diagnostic(code(certsmith::config::invalid_key_type), help("check LE_CRT_KEY_TYPE"))]
    InvalidKeyType { value: String },

    #[error("Invalid DNS timeout '{value}': DNS_TIMEOUT must be a non-negative number of seconds")]
    #[diagnostic(code(certsmith::config::invalid_timeout))]
    InvalidTimeout { value: String },

    #[error("Invalid boolean '{value}' for {variable}")]
    #[diagnostic(
        code(certsmith::config::invalid_boolean),
        help("accepted values: 1, t, T, TRUE, true, True, 0, f, F, FALSE, false, False")
    )]
    InvalidBoolean { variable: &'static str, value: String },

    #[error("Invalid DNS auth token. Use one of 'DNS_AUTH_TOKEN_VAULT', 'DNS_AUTH_TOKEN_FILE' or 'DNS_AUTH_TOKEN' env variable")]
    #[diagnostic(code(certsmith::config::missing_credential))]
    MissingCredential,

    #[error("Invalid DNS auth token secret name: DNS_AUTH_TOKEN_SECRET must not be empty when DNS_AUTH_TOKEN_VAULT is set")]
    #[diagnostic(code(certsmith::config::invalid_vault_secret))]
    InvalidVaultSecret,

    #[error("Failed to retrieve DNS auth token configured by {variable}")]
    #[diagnostic(code(certsmith::config::secret))]
    Secret {
        variable: &'static str,
        #[source]
        source: SecretError,
    },

    #[error("{context}")]
    #[diagnostic(code(certsmith::config::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read configuration from the environment: {0}")]
    #[diagnostic(code(certsmith::config::environment))]
    Environment(#[from] envy::Error),
}

impl ConfigError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            context: context.into(),
            source,
        }
    }
}
