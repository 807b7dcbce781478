//! Certificate bundle storage
//!
//! A bundle is three PEM files sharing one artifact name:
//!
//! ```text
//! output/
//! ├── example.com.crt          # Full chain, leaf first
//! ├── example.com.key          # Private key of the leaf
//! └── example.com.issuer.crt   # Chain without the leaf
//! ```
//!
//! Files are written as `.{file}.tmp` siblings first and renamed into place
//! only once all three were written.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

use super::error::{AcmeError, StorageError};
use super::issuer::IssuedCertificate;

const PEM_CERTIFICATE: &str = "CERTIFICATE";

/// Facts about the first certificate of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    /// Subject distinguished name
    pub subject: String,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Whether the basic constraints mark it as a CA
    pub is_ca: bool,
}

impl LeafCertificate {
    /// Inspect the first certificate found in `bundle_pem`
    pub fn parse(bundle_pem: &str) -> Result<Self, AcmeError> {
        let blocks = pem::parse_many(bundle_pem)
            .map_err(|e| AcmeError::CertificateParse(format!("Failed to parse PEM: {}", e)))?;
        let first = blocks
            .iter()
            .find(|block| block.tag() == PEM_CERTIFICATE)
            .ok_or_else(|| AcmeError::CertificateParse("no certificate in bundle".to_string()))?;

        let (_, cert) = X509Certificate::from_der(first.contents()).map_err(|e| {
            AcmeError::CertificateParse(format!("Failed to parse certificate: {}", e))
        })?;

        let is_ca = cert
            .basic_constraints()
            .map_err(|e| AcmeError::CertificateParse(format!("Invalid basic constraints: {}", e)))?
            .map(|ext| ext.value.ca)
            .unwrap_or(false);

        let timestamp = cert.validity().not_after.timestamp();
        let not_after = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| AcmeError::CertificateParse("Invalid expiry timestamp".to_string()))?;

        Ok(Self {
            subject: cert.subject().to_string(),
            not_after,
            is_ca,
        })
    }

    /// Whole days left before expiry, truncated toward zero
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_seconds() / 86_400
    }
}

/// Location of one certificate bundle
#[derive(Debug, Clone)]
pub struct BundleStore {
    directory: PathBuf,
    name: String,
}

impl BundleStore {
    /// Bundle named `name` inside `directory`
    ///
    /// The directory must already exist.
    pub fn new(directory: &Path, name: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            name: name.to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.directory.join(format!("{}.crt", self.name))
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.directory.join(format!("{}.key", self.name))
    }

    pub fn issuer_path(&self) -> PathBuf {
        self.directory.join(format!("{}.issuer.crt", self.name))
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.directory.join(format!(".{}.tmp", file_name))
    }

    /// Read the stored certificate chain
    ///
    /// A missing or unreadable file reads as `None`.
    pub fn load_certificate(&self) -> Option<String> {
        let path = self.certificate_path();
        match fs::read_to_string(&path) {
            Ok(content) => {
                trace!(path = %path.display(), "Loaded certificate bundle");
                Some(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No certificate bundle found");
                None
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Certificate bundle is unreadable, treating it as absent"
                );
                None
            }
        }
    }

    /// Inspect the leaf of the stored bundle
    pub fn load_leaf(&self) -> Option<Result<LeafCertificate, AcmeError>> {
        self.load_certificate().map(|pem| LeafCertificate::parse(&pem))
    }

    /// Replace the bundle with `issued`
    pub fn save(&self, issued: &IssuedCertificate) -> Result<(), StorageError> {
        let files = [
            (self.certificate_path(), issued.certificate.as_str()),
            (self.private_key_path(), issued.private_key.as_str()),
            (self.issuer_path(), issued.issuer_certificate.as_str()),
        ];

        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
        for (target, content) in &files {
            let temp = self.temp_path(target);
            if let Err(source) = write_private(&temp, content) {
                // The temp file may exist half-written
                let _ = fs::remove_file(&temp);
                for (written, _) in &staged {
                    let _ = fs::remove_file(written);
                }
                return Err(StorageError::Write { path: temp, source });
            }
            staged.push((temp, target.as_path()));
        }

        for (index, (temp, target)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(temp, target) {
                for (leftover, _) in &staged[index..] {
                    let _ = fs::remove_file(leftover);
                }
                if index == 0 {
                    // Nothing was replaced yet
                    return Err(StorageError::Write {
                        path: target.to_path_buf(),
                        source,
                    });
                }
                return Err(StorageError::Replace {
                    path: target.to_path_buf(),
                    source,
                });
            }
        }

        info!(
            certificate = %self.certificate_path().display(),
            "Saved certificate bundle"
        );
        Ok(())
    }
}

/// Write `content` to a new file readable only by the owner
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
