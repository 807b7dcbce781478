//! Raw configuration to resolved configuration
//!
//! Resolution runs a fixed sequence of steps and stops at the first failure:
//!
//! 1. domains
//! 2. artifact name
//! 3. account email
//! 4. terms of service agreement
//! 5. account key (loaded, or generated and persisted)
//! 6. CA directory
//! 7. certificate key type
//! 8. DNS resolvers
//! 9. DNS timeout
//! 10. propagation check switch
//! 11. output directory (made absolute and created)
//! 12. DNS provider credential
//! 13. static file server settings
//!
//! Step 5 and step 11 touch the filesystem, step 12 may reach out to a secret
//! store. The order is observable through which error is reported when several
//! options are wrong at once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use certsmith_common::SecretRegistry;
use tracing::{debug, info};

use crate::account_key::AccountKey;
use crate::defaults::{self, env};
use crate::domain::{sanitize_domain, split_list};
use crate::errors::ConfigError;
use crate::raw::RawConfiguration;

/// Parse a boolean the way operators have always spelled them
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their `0`/`f`/`false`
/// counterparts. Anything else, including surrounding whitespace, is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Key type of the certificate (not of the account)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa4096,
    Rsa8192,
}

impl KeyAlgorithm {
    /// Modulus size in bits
    pub fn bits(self) -> usize {
        match self {
            KeyAlgorithm::Rsa2048 => 2048,
            KeyAlgorithm::Rsa4096 => 4096,
            KeyAlgorithm::Rsa8192 => 8192,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            defaults::KEY_TYPE_RSA2048 => Some(KeyAlgorithm::Rsa2048),
            defaults::KEY_TYPE_RSA4096 => Some(KeyAlgorithm::Rsa4096),
            defaults::KEY_TYPE_RSA8192 => Some(KeyAlgorithm::Rsa8192),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAlgorithm::Rsa2048 => defaults::KEY_TYPE_RSA2048,
            KeyAlgorithm::Rsa4096 => defaults::KEY_TYPE_RSA4096,
            KeyAlgorithm::Rsa8192 => defaults::KEY_TYPE_RSA8192,
        };
        f.write_str(name)
    }
}

/// Where the DNS provider credential comes from
///
/// Exactly one source is selected, in priority order
/// `Inline` > `File` > `Vault`.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Value given directly in `DNS_AUTH_TOKEN`
    Inline(String),
    /// File named by `DNS_AUTH_TOKEN_FILE`
    File(PathBuf),
    /// Secret in the key vault named by `DNS_AUTH_TOKEN_VAULT`
    Vault { uri: String, secret: String },
}

impl CredentialSource {
    /// Select the credential source configured in `raw`
    pub fn select(raw: &RawConfiguration) -> Result<Self, ConfigError> {
        if !raw.dns_auth_token.is_empty() {
            return Ok(CredentialSource::Inline(raw.dns_auth_token.clone()));
        }
        if !raw.dns_auth_token_file.is_empty() {
            return Ok(CredentialSource::File(PathBuf::from(&raw.dns_auth_token_file)));
        }
        if !raw.dns_auth_token_vault.is_empty() {
            if raw.dns_auth_token_secret.is_empty() {
                return Err(ConfigError::InvalidVaultSecret);
            }
            return Ok(CredentialSource::Vault {
                uri: vault_uri(&raw.dns_auth_token_vault),
                secret: raw.dns_auth_token_secret.clone(),
            });
        }
        Err(ConfigError::MissingCredential)
    }

    /// Retrieve the credential value
    pub async fn fetch(&self, secrets: &SecretRegistry) -> Result<String, ConfigError> {
        match self {
            CredentialSource::Inline(value) => Ok(value.clone()),
            CredentialSource::File(path) => {
                secrets
                    .files()
                    .get_token(path)
                    .await
                    .map_err(|source| ConfigError::Secret {
                        variable: env::DNS_AUTH_TOKEN_FILE,
                        source,
                    })
            }
            CredentialSource::Vault { uri, secret } => secrets
                .vault()
                .get_token(uri, secret)
                .await
                .map_err(|source| ConfigError::Secret {
                    variable: env::DNS_AUTH_TOKEN_VAULT,
                    source,
                }),
        }
    }

    /// Description safe for logs
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Inline(_) => format!("environment variable {}", env::DNS_AUTH_TOKEN),
            CredentialSource::File(path) => format!("file {}", path.display()),
            CredentialSource::Vault { uri, secret } => format!("secret '{secret}' in {uri}"),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Inline(_) => f.write_str("Inline(<redacted>)"),
            CredentialSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialSource::Vault { uri, secret } => f
                .debug_struct("Vault")
                .field("uri", uri)
                .field("secret", secret)
                .finish(),
        }
    }
}

/// Expand a key vault locator into its URI
///
/// Explicit URLs are kept as they are, bare names become
/// `https://{name}.vault.azure.net/`.
pub fn vault_uri(locator: &str) -> String {
    if locator.starts_with("https://") || locator.starts_with("http://") {
        locator.to_string()
    } else {
        format!("https://{locator}.{}/", defaults::VAULT_HOST_SUFFIX)
    }
}

/// Static file server settings, carried through unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebConfig {
    pub root: PathBuf,
    pub enabled: bool,
}

/// Validated configuration
#[derive(Clone)]
pub struct ResolvedConfiguration {
    pub account_email: String,
    pub account_key: AccountKey,
    pub terms_accepted: bool,
    pub ca_directory_url: String,
    pub key_algorithm: KeyAlgorithm,
    pub domains: Vec<String>,
    pub artifact_name: String,
    pub output_directory: PathBuf,
    pub dns_credential: String,
    pub credential_source: CredentialSource,
    pub dns_resolvers: Vec<String>,
    pub dns_timeout: Duration,
    pub disable_propagation_check: bool,
    pub web: WebConfig,
}

impl fmt::Debug for ResolvedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfiguration")
            .field("account_email", &self.account_email)
            .field("account_key", &self.account_key)
            .field("terms_accepted", &self.terms_accepted)
            .field("ca_directory_url", &self.ca_directory_url)
            .field("key_algorithm", &self.key_algorithm)
            .field("domains", &self.domains)
            .field("artifact_name", &self.artifact_name)
            .field("output_directory", &self.output_directory)
            .field("dns_credential", &"<redacted>")
            .field("credential_source", &self.credential_source)
            .field("dns_resolvers", &self.dns_resolvers)
            .field("dns_timeout", &self.dns_timeout)
            .field("disable_propagation_check", &self.disable_propagation_check)
            .field("web", &self.web)
            .finish()
    }
}

/// Resolves one [`RawConfiguration`] against a set of secret stores
pub struct ConfigResolver<'a> {
    raw: &'a RawConfiguration,
    secrets: &'a SecretRegistry,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(raw: &'a RawConfiguration, secrets: &'a SecretRegistry) -> Self {
        Self { raw, secrets }
    }

    pub fn domains(&self) -> Result<Vec<String>, ConfigError> {
        let domains = split_list(&self.raw.domains);
        if domains.is_empty() {
            return Err(ConfigError::MissingDomains);
        }
        Ok(domains)
    }

    /// Operator-chosen file name, or the sanitised first domain
    pub fn artifact_name(&self, domains: &[String]) -> Result<String, ConfigError> {
        if !self.raw.filename.is_empty() {
            return Ok(self.raw.filename.clone());
        }
        match domains.first() {
            Some(first) => sanitize_domain(first),
            None => Err(ConfigError::MissingDomains),
        }
    }

    pub fn account_email(&self) -> Result<String, ConfigError> {
        if self.raw.account_email.is_empty() {
            return Err(ConfigError::MissingEmail);
        }
        Ok(self.raw.account_email.clone())
    }

    pub fn terms_accepted(&self) -> Result<bool, ConfigError> {
        match parse_bool(&self.raw.le_tos_agreed) {
            Some(true) => Ok(true),
            _ => Err(ConfigError::TermsNotAccepted {
                value: self.raw.le_tos_agreed.clone(),
            }),
        }
    }

    pub fn account_key(&self) -> Result<AccountKey, ConfigError> {
        AccountKey::load_or_generate(Path::new(&self.raw.account_key_file))
    }

    pub fn ca_directory(&self) -> Result<String, ConfigError> {
        let value = &self.raw.ca_dir;
        let url = match value.to_ascii_uppercase().as_str() {
            defaults::CA_PRODUCTION => defaults::LETSENCRYPT_PRODUCTION.to_string(),
            defaults::CA_STAGING => defaults::LETSENCRYPT_STAGING.to_string(),
            defaults::CA_TEST => defaults::LOCAL_TEST_DIRECTORY.to_string(),
            _ if value.starts_with("http://") || value.starts_with("https://") => value.clone(),
            _ => {
                return Err(ConfigError::InvalidCADirectory {
                    value: value.clone(),
                })
            }
        };
        Ok(url)
    }

    pub fn key_algorithm(&self) -> Result<KeyAlgorithm, ConfigError> {
        KeyAlgorithm::parse(&self.raw.le_crt_key_type).ok_or_else(|| ConfigError::InvalidKeyType {
            value: self.raw.le_crt_key_type.clone(),
        })
    }

    pub fn dns_resolvers(&self) -> Vec<String> {
        split_list(&self.raw.dns_resolvers)
    }

    pub fn dns_timeout(&self) -> Result<Duration, ConfigError> {
        let invalid = || ConfigError::InvalidTimeout {
            value: self.raw.dns_timeout.clone(),
        };
        let seconds: f64 = self.raw.dns_timeout.trim().parse().map_err(|_| invalid())?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
    }

    pub fn disable_propagation_check(&self) -> Result<bool, ConfigError> {
        parse_bool(&self.raw.disable_cp).ok_or_else(|| ConfigError::InvalidBoolean {
            variable: env::DISABLE_CP,
            value: self.raw.disable_cp.clone(),
        })
    }

    /// Absolute output directory, created with its parents
    pub fn output_directory(&self) -> Result<PathBuf, ConfigError> {
        let dir = std::path::absolute(&self.raw.output_directory).map_err(|e| {
            ConfigError::io(
                format!("Invalid output directory '{}'", self.raw.output_directory),
                e,
            )
        })?;
        std::fs::create_dir_all(&dir).map_err(|e| {
            ConfigError::io(
                format!("Failed to create output directory {}", dir.display()),
                e,
            )
        })?;
        Ok(dir)
    }

    pub async fn dns_credential(&self) -> Result<(CredentialSource, String), ConfigError> {
        let source = CredentialSource::select(self.raw)?;
        let credential = source.fetch(self.secrets).await?;
        debug!(source = %source.describe(), "Resolved DNS provider credential");
        Ok((source, credential))
    }

    pub fn web(&self) -> Result<WebConfig, ConfigError> {
        let enabled = parse_bool(&self.raw.web_enabled).ok_or_else(|| ConfigError::InvalidBoolean {
            variable: env::WEB_ENABLED,
            value: self.raw.web_enabled.clone(),
        })?;
        Ok(WebConfig {
            root: PathBuf::from(&self.raw.web_root),
            enabled,
        })
    }

    /// Run every step in order
    pub async fn resolve(&self) -> Result<ResolvedConfiguration, ConfigError> {
        let domains = self.domains()?;
        let artifact_name = self.artifact_name(&domains)?;
        let account_email = self.account_email()?;
        let terms_accepted = self.terms_accepted()?;
        let account_key = self.account_key()?;
        let ca_directory_url = self.ca_directory()?;
        let key_algorithm = self.key_algorithm()?;
        let dns_resolvers = self.dns_resolvers();
        let dns_timeout = self.dns_timeout()?;
        let disable_propagation_check = self.disable_propagation_check()?;
        let output_directory = self.output_directory()?;
        let (credential_source, dns_credential) = self.dns_credential().await?;
        let web = self.web()?;

        info!(
            domains = ?domains,
            artifact = %artifact_name,
            ca = %ca_directory_url,
            key_type = %key_algorithm,
            account_key = account_key.algorithm(),
            output = %output_directory.display(),
            credential = %credential_source.describe(),
            "Configuration resolved"
        );

        Ok(ResolvedConfiguration {
            account_email,
            account_key,
            terms_accepted,
            ca_directory_url,
            key_algorithm,
            domains,
            artifact_name,
            output_directory,
            dns_credential,
            credential_source,
            dns_resolvers,
            dns_timeout,
            disable_propagation_check,
            web,
        })
    }
}

/// Resolve `raw` against `secrets`
pub async fn resolve(
    raw: &RawConfiguration,
    secrets: &SecretRegistry,
) -> Result<ResolvedConfiguration, ConfigError> {
    ConfigResolver::new(raw, secrets).resolve().await
}
