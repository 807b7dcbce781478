//! Shared test utilities for integration tests
//!
//! Certificates are minted locally with rcgen so the lifecycle can be driven
//! without a CA.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

use certsmith_acme::acme::{
    AcmeError, BundleStore, CertificateIssuer, CertificateLifecycleManager, IssuedCertificate,
};
use certsmith_acme::reload::{ReloadError, ReloadTarget};

/// Domain every test certificate is issued for
pub const TEST_DOMAIN: &str = "example.com";

/// A self-signed certificate and its key, both PEM
pub struct MintedCertificate {
    pub certificate: String,
    pub private_key: String,
}

/// Mint a certificate expiring `days` days (plus one hour) from now
///
/// The extra hour keeps the whole-day count at exactly `days`.
pub fn mint_certificate(days: i64, is_ca: bool) -> MintedCertificate {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![TEST_DOMAIN.to_string()]).unwrap();

    let now = OffsetDateTime::now_utc();
    params.not_after = now + Duration::days(days) + Duration::hours(1);
    params.not_before = params.not_after.min(now) - Duration::days(90);
    if is_ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }

    let cert = params.self_signed(&key).unwrap();
    MintedCertificate {
        certificate: cert.pem(),
        private_key: key.serialize_pem(),
    }
}

/// An issued bundle: leaf expiring in `days` days followed by a CA certificate
pub fn issued_bundle(days: i64, leaf_is_ca: bool) -> IssuedCertificate {
    let leaf = mint_certificate(days, leaf_is_ca);
    let issuer = mint_certificate(days + 365, true);
    let chain = format!("{}{}", leaf.certificate, issuer.certificate);
    IssuedCertificate::from_chain(&chain, leaf.private_key).unwrap()
}

/// Issuer returning locally minted certificates
#[derive(Debug)]
pub struct FakeIssuer {
    pub register_calls: AtomicUsize,
    pub obtain_calls: AtomicUsize,
    /// Validity of issued certificates, in days
    pub issue_days: i64,
    pub fail_register: bool,
    /// Fail this many obtain calls before succeeding
    pub failing_obtains: Mutex<usize>,
    pub requested_domains: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeIssuer {
    fn default() -> Self {
        Self {
            register_calls: AtomicUsize::new(0),
            obtain_calls: AtomicUsize::new(0),
            issue_days: 90,
            fail_register: false,
            failing_obtains: Mutex::new(0),
            requested_domains: Mutex::new(Vec::new()),
        }
    }
}

impl FakeIssuer {
    pub fn failing_obtains(count: usize) -> Self {
        Self {
            failing_obtains: Mutex::new(count),
            ..Self::default()
        }
    }

    pub fn failing_registration() -> Self {
        Self {
            fail_register: true,
            ..Self::default()
        }
    }

    pub fn registrations(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn obtains(&self) -> usize {
        self.obtain_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateIssuer for FakeIssuer {
    async fn register(&self) -> Result<(), AcmeError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register {
            return Err(AcmeError::AccountCreation("account rejected".to_string()));
        }
        Ok(())
    }

    async fn obtain(&self, domains: &[String]) -> Result<IssuedCertificate, AcmeError> {
        self.obtain_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_domains.lock().push(domains.to_vec());

        {
            let mut failing = self.failing_obtains.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(AcmeError::Timeout("order not ready".to_string()));
            }
        }

        Ok(issued_bundle(self.issue_days, false))
    }
}

/// Reload target counting notifications
#[derive(Debug, Default)]
pub struct RecordingReloadTarget {
    pub reloads: AtomicUsize,
}

impl RecordingReloadTarget {
    pub fn count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReloadTarget for RecordingReloadTarget {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    async fn reload(&self) -> Result<(), ReloadError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A manager over a fresh temporary directory
pub struct TestBed {
    pub dir: TempDir,
    pub issuer: Arc<FakeIssuer>,
    pub manager: Arc<CertificateLifecycleManager>,
}

impl TestBed {
    pub fn new(issuer: FakeIssuer) -> Self {
        let dir = TempDir::new().unwrap();
        let issuer = Arc::new(issuer);
        let store = BundleStore::new(dir.path(), TEST_DOMAIN);
        let manager = Arc::new(CertificateLifecycleManager::new(
            issuer.clone(),
            store,
            vec![TEST_DOMAIN.to_string(), format!("*.{}", TEST_DOMAIN)],
        ));
        Self {
            dir,
            issuer,
            manager,
        }
    }

    pub fn store(&self) -> &BundleStore {
        self.manager.store()
    }

    /// Put a bundle on disk as if issued earlier
    pub fn install(&self, bundle: &IssuedCertificate) {
        self.store().save(bundle).unwrap();
    }

    /// Contents of the three bundle files, in cert/key/issuer order
    pub fn files(&self) -> [Option<String>; 3] {
        let store = self.store();
        [
            std::fs::read_to_string(store.certificate_path()).ok(),
            std::fs::read_to_string(store.private_key_path()).ok(),
            std::fs::read_to_string(store.issuer_path()).ok(),
        ]
    }
}
