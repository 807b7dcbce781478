//! Certificate lifecycle decisions against bundles on disk

mod common;

use std::fs;

use certsmith_acme::acme::{CertificateError, CertificateState, LeafCertificate};
use common::{issued_bundle, FakeIssuer, TestBed, TEST_DOMAIN};

const THRESHOLD: i64 = 21;

#[tokio::test]
async fn test_missing_bundle_is_issued() {
    let bed = TestBed::new(FakeIssuer::default());
    assert_eq!(bed.manager.classify(THRESHOLD), CertificateState::Absent);

    let changed = bed.manager.ensure_valid(THRESHOLD).await.unwrap();
    assert!(changed);
    assert_eq!(bed.issuer.registrations(), 1);
    assert_eq!(bed.issuer.obtains(), 1);

    let [cert, key, issuer] = bed.files();
    let cert = cert.expect("certificate written");
    assert!(key.expect("key written").contains("PRIVATE KEY"));
    let issuer = issuer.expect("issuer written");

    // Full chain first, issuer file holds the rest
    assert!(cert.ends_with(&issuer));
    let leaf = LeafCertificate::parse(&cert).unwrap();
    assert!(!leaf.is_ca);
    assert_eq!(leaf.days_remaining(chrono::Utc::now()), 90);
}

#[tokio::test]
async fn test_requests_all_domains() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.manager.ensure_valid(THRESHOLD).await.unwrap();

    let requested = bed.issuer.requested_domains.lock().clone();
    assert_eq!(
        requested,
        vec![vec![TEST_DOMAIN.to_string(), format!("*.{}", TEST_DOMAIN)]]
    );
}

#[tokio::test]
async fn test_certificate_beyond_threshold_is_kept() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(THRESHOLD + 1, false));
    let before = bed.files();

    assert_eq!(
        bed.manager.classify(THRESHOLD),
        CertificateState::Valid {
            days_remaining: THRESHOLD + 1
        }
    );

    let changed = bed.manager.ensure_valid(THRESHOLD).await.unwrap();
    assert!(!changed);
    assert_eq!(bed.issuer.obtains(), 0);
    assert_eq!(bed.issuer.registrations(), 0);
    assert_eq!(bed.files(), before);
}

#[tokio::test]
async fn test_certificate_within_threshold_is_renewed() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(THRESHOLD - 1, false));
    let before = bed.files();

    assert_eq!(
        bed.manager.classify(THRESHOLD),
        CertificateState::NeedsRenewal {
            days_remaining: THRESHOLD - 1
        }
    );

    let changed = bed.manager.ensure_valid(THRESHOLD).await.unwrap();
    assert!(changed);
    assert_eq!(bed.issuer.obtains(), 1);

    let after = bed.files();
    assert_ne!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    assert_ne!(after[2], before[2]);
}

#[tokio::test]
async fn test_threshold_boundary_renews() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(THRESHOLD, false));

    // days_remaining == threshold is not "more than" the threshold
    assert!(bed.manager.ensure_valid(THRESHOLD).await.unwrap());
}

#[tokio::test]
async fn test_expired_certificate_is_renewed() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(-10, false));

    assert!(matches!(
        bed.manager.classify(THRESHOLD),
        CertificateState::NeedsRenewal { days_remaining } if days_remaining < 0
    ));
    assert!(bed.manager.ensure_valid(THRESHOLD).await.unwrap());
}

#[tokio::test]
async fn test_negative_threshold_never_renews_present_certificate() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(-10, false));

    assert!(!bed.manager.ensure_valid(-1).await.unwrap());
    assert_eq!(bed.issuer.obtains(), 0);
}

#[tokio::test]
async fn test_negative_threshold_still_issues_missing_certificate() {
    let bed = TestBed::new(FakeIssuer::default());
    assert!(bed.manager.ensure_valid(-1).await.unwrap());
}

#[tokio::test]
async fn test_ca_leaf_is_invalid_chain_without_write() {
    let bed = TestBed::new(FakeIssuer::default());
    bed.install(&issued_bundle(5, true));
    let before = bed.files();

    assert_eq!(bed.manager.classify(THRESHOLD), CertificateState::InvalidChain);

    let err = bed.manager.ensure_valid(THRESHOLD).await.unwrap_err();
    assert!(matches!(err, CertificateError::InvalidChain { .. }));
    assert!(!err.is_recoverable());
    assert_eq!(bed.files(), before);
    assert_eq!(bed.issuer.obtains(), 0);
}

#[tokio::test]
async fn test_unparsable_bundle_is_treated_as_absent() {
    let bed = TestBed::new(FakeIssuer::default());
    fs::write(bed.store().certificate_path(), "not a certificate").unwrap();

    assert_eq!(bed.manager.classify(THRESHOLD), CertificateState::Absent);
    assert!(bed.manager.ensure_valid(THRESHOLD).await.unwrap());
    assert!(LeafCertificate::parse(&bed.files()[0].clone().unwrap()).is_ok());
}

#[tokio::test]
async fn test_registers_once_per_manager() {
    let bed = TestBed::new(FakeIssuer::default());

    // Renew on every call
    assert!(bed.manager.ensure_valid(1000).await.unwrap());
    assert!(bed.manager.ensure_valid(1000).await.unwrap());

    assert_eq!(bed.issuer.registrations(), 1);
    assert_eq!(bed.issuer.obtains(), 2);
}

#[tokio::test]
async fn test_registration_failure_is_fatal() {
    let bed = TestBed::new(FakeIssuer::failing_registration());

    let err = bed.manager.ensure_valid(THRESHOLD).await.unwrap_err();
    assert!(matches!(err, CertificateError::Registration(_)));
    assert!(!err.is_recoverable());
    assert_eq!(bed.issuer.obtains(), 0);
    assert_eq!(bed.files(), [None, None, None]);
}

#[tokio::test]
async fn test_obtain_failure_keeps_previous_bundle() {
    let bed = TestBed::new(FakeIssuer::failing_obtains(1));
    bed.install(&issued_bundle(3, false));
    let before = bed.files();

    let err = bed.manager.ensure_valid(THRESHOLD).await.unwrap_err();
    assert!(matches!(err, CertificateError::CertificateRequestFailed(_)));
    assert!(err.is_recoverable());
    assert_eq!(bed.files(), before);

    // The next attempt goes through without registering again
    assert!(bed.manager.ensure_valid(THRESHOLD).await.unwrap());
    assert_eq!(bed.issuer.registrations(), 1);
}

#[tokio::test]
async fn test_concurrent_checks_issue_once() {
    let bed = TestBed::new(FakeIssuer::default());

    let (a, b) = tokio::join!(
        bed.manager.ensure_valid(THRESHOLD),
        bed.manager.ensure_valid(THRESHOLD)
    );

    // The second check sees the bundle written by the first
    let changed = [a.unwrap(), b.unwrap()];
    assert_eq!(changed.iter().filter(|c| **c).count(), 1);
    assert_eq!(bed.issuer.obtains(), 1);
}
