//! ACME account key loading and generation
//!
//! Loading and generation are separate steps: [`AccountKey::load`] reports a
//! missing file as `Ok(None)` and the caller decides to generate. An existing
//! key file is never overwritten.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use tracing::{debug, info};

use crate::errors::ConfigError;

const PEM_RSA_PKCS1: &str = "RSA PRIVATE KEY";
const PEM_EC_SEC1: &str = "EC PRIVATE KEY";
const PEM_PKCS8: &str = "PRIVATE KEY";

/// Private key identifying the ACME account
#[derive(Clone)]
pub enum AccountKey {
    Rsa(Box<RsaPrivateKey>),
    EcdsaP256(p256::SecretKey),
}

impl AccountKey {
    /// Load the key stored at `path`
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::io(
                    format!("Failed to read account key {}", path.display()),
                    e,
                ))
            }
        };

        let block = pem::parse(&bytes).map_err(|e| ConfigError::InvalidAccountKey {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let invalid = |reason: String| ConfigError::InvalidAccountKey {
            path: path.to_path_buf(),
            reason,
        };

        let key = match block.tag() {
            PEM_RSA_PKCS1 => RsaPrivateKey::from_pkcs1_der(block.contents())
                .map(|k| AccountKey::Rsa(Box::new(k)))
                .map_err(|e| invalid(e.to_string()))?,
            PEM_EC_SEC1 => p256::SecretKey::from_sec1_der(block.contents())
                .map(AccountKey::EcdsaP256)
                .map_err(|e| invalid(e.to_string()))?,
            PEM_PKCS8 => Self::from_pkcs8(block.contents()).map_err(invalid)?,
            other => {
                return Err(ConfigError::UnknownKeyFormat {
                    path: path.to_path_buf(),
                    block: other.to_string(),
                })
            }
        };

        debug!(
            path = %path.display(),
            algorithm = key.algorithm(),
            "Loaded account key"
        );
        Ok(Some(key))
    }

    fn from_pkcs8(der: &[u8]) -> Result<Self, String> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(AccountKey::Rsa(Box::new(key)));
        }
        p256::SecretKey::from_pkcs8_der(der)
            .map(AccountKey::EcdsaP256)
            .map_err(|e| format!("PKCS#8 key is neither RSA nor P-256: {e}"))
    }

    /// Generate a P-256 key and write it to `path` as SEC1 PEM (mode 0600)
    ///
    /// Fails if the file already exists.
    pub fn generate_and_persist(path: &Path) -> Result<Self, ConfigError> {
        let secret = p256::SecretKey::random(&mut OsRng);
        let pem = secret
            .to_sec1_pem(LineEnding::LF)
            .map_err(|e| ConfigError::InvalidAccountKey {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let context = || format!("Failed to write account key {}", path.display());
        let mut file = options
            .open(path)
            .map_err(|e| ConfigError::io(context(), e))?;
        file.write_all(pem.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| ConfigError::io(context(), e))?;

        info!(path = %path.display(), "Generated new ECDSA P-256 account key");
        Ok(AccountKey::EcdsaP256(secret))
    }

    /// Load the key at `path`, generating it first when missing
    pub fn load_or_generate(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path)? {
            Some(key) => Ok(key),
            None => Self::generate_and_persist(path),
        }
    }

    /// Encode the key as PKCS#8 DER
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, p256::pkcs8::Error> {
        let document = match self {
            AccountKey::Rsa(key) => key.to_pkcs8_der()?,
            AccountKey::EcdsaP256(key) => key.to_pkcs8_der()?,
        };
        Ok(document.as_bytes().to_vec())
    }

    /// Human-readable algorithm name
    pub fn algorithm(&self) -> &'static str {
        match self {
            AccountKey::Rsa(_) => "RSA",
            AccountKey::EcdsaP256(_) => "ECDSA P-256",
        }
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountKey")
            .field(&self.algorithm())
            .finish()
    }
}

impl PartialEq for AccountKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AccountKey::Rsa(a), AccountKey::Rsa(b)) => a == b,
            (AccountKey::EcdsaP256(a), AccountKey::EcdsaP256(b)) => a == b,
            _ => false,
        }
    }
}
