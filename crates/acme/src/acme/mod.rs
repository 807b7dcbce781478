//! Certificate lifecycle over ACME
//!
//! # Architecture
//!
//! - [`CertificateLifecycleManager`] decides whether a new certificate is needed
//! - [`CertificateIssuer`] obtains one; [`AcmeIssuer`] does it with DNS-01
//! - [`BundleStore`] keeps the PEM files on disk
//! - [`RenewalScheduler`] repeats the check and notifies the service
//!
//! # Storage layout
//!
//! ```text
//! {OUTPUT_DIRECTORY}/
//! ├── {name}.crt
//! ├── {name}.key
//! └── {name}.issuer.crt
//! ```

mod client;
pub mod dns;
mod error;
mod issuer;
mod lifecycle;
mod scheduler;
mod storage;

pub use client::AcmeIssuer;
pub use error::{AcmeError, CertificateError, StorageError};
pub use issuer::{CertificateIssuer, IssuedCertificate};
pub use lifecycle::{CertificateLifecycleManager, CertificateState};
pub use scheduler::{RenewalScheduler, DEFAULT_CHECK_INTERVAL, MIN_CHECK_INTERVAL};
pub use storage::{BundleStore, LeafCertificate};
