//! Secret sources for DNS provider credentials
//!
//! A secret is a single opaque string. Two backing media are supported, each
//! behind its own capability trait so the configuration resolver can be handed
//! real stores in production and fixed values in tests:
//!
//! - [`FileSecretSource`] - reads a token from a local file ([`FileStore`])
//! - [`VaultSecretSource`] - fetches a named secret from a remote key vault
//!   ([`AzureKeyVault`])
//!
//! [`StaticSecretSource`] implements both traits with a value held in memory.
//! [`SecretRegistry`] bundles one instance of each and is passed by reference
//! into the resolver.

mod azure;
mod file;

pub use azure::{AmbientCredential, AzureKeyVault, KEY_VAULT_API_VERSION};
pub use file::FileStore;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for secret lookups
pub type SecretResult<T> = Result<T, SecretError>;

/// Errors that can occur while retrieving a secret
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backing file could not be read
    #[error("Failed to read secret file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The secret exists but is empty once the trailing newline is removed
    #[error("Invalid token found in {location}")]
    EmptySecret { location: String },

    /// Authentication against the secret store failed
    #[error("Secret store authentication failed: {0}")]
    Auth(String),

    /// The named secret does not exist in the store
    #[error("Secret '{name}' not found in {store}")]
    NotFound { store: String, name: String },

    /// Transport or protocol failure talking to the store
    #[error("Secret store request failed: {0}")]
    Request(String),
}

/// Secret source backed by local files
#[async_trait]
pub trait FileSecretSource: Send + Sync + Debug {
    /// Read the token stored at `path`
    async fn get_token(&self, path: &Path) -> SecretResult<String>;
}

/// Secret source backed by a remote key vault
#[async_trait]
pub trait VaultSecretSource: Send + Sync + Debug {
    /// Fetch the current value of `secret_name` from the vault at `vault_uri`
    async fn get_token(&self, vault_uri: &str, secret_name: &str) -> SecretResult<String>;
}

/// Remove exactly one trailing line break (`\n` or `\r\n`)
pub fn strip_trailing_newline(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value)
}

/// In-process secret source returning a fixed value
///
/// Used for inline credentials and as a deterministic double for the real
/// stores in tests.
#[derive(Clone)]
pub struct StaticSecretSource {
    token: String,
}

impl StaticSecretSource {
    /// Create a source that always returns `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Debug for StaticSecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretSource")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl FileSecretSource for StaticSecretSource {
    async fn get_token(&self, _path: &Path) -> SecretResult<String> {
        Ok(self.token.clone())
    }
}

#[async_trait]
impl VaultSecretSource for StaticSecretSource {
    async fn get_token(&self, _vault_uri: &str, _secret_name: &str) -> SecretResult<String> {
        Ok(self.token.clone())
    }
}

/// The set of secret stores used to find the DNS provider credential
#[derive(Debug, Clone)]
pub struct SecretRegistry {
    files: Arc<dyn FileSecretSource>,
    vault: Arc<dyn VaultSecretSource>,
}

impl SecretRegistry {
    /// Build a registry from explicit store instances
    pub fn new(files: Arc<dyn FileSecretSource>, vault: Arc<dyn VaultSecretSource>) -> Self {
        Self { files, vault }
    }

    /// Production stores: local files and Azure Key Vault with ambient credentials
    pub fn default_stores() -> Self {
        Self::new(Arc::new(FileStore::new()), Arc::new(AzureKeyVault::new()))
    }

    /// Stores that answer every lookup with `token`
    pub fn fixed(token: impl Into<String>) -> Self {
        let source = Arc::new(StaticSecretSource::new(token));
        Self::new(source.clone(), source)
    }

    /// Access the file store
    pub fn files(&self) -> &dyn FileSecretSource {
        self.files.as_ref()
    }

    /// Access the key vault store
    pub fn vault(&self) -> &dyn VaultSecretSource {
        self.vault.as_ref()
    }
}

impl Default for SecretRegistry {
    fn default() -> Self {
        Self::default_stores()
    }
}
