//! certsmith keeps a TLS certificate issued over ACME valid and tells the
//! service using it when a new one was written.
//!
//! Configuration comes from `certsmith-config`; this crate holds the
//! certificate lifecycle ([`acme`]) and service notification ([`reload`]).

pub mod acme;
pub mod reload;

pub use acme::{
    AcmeIssuer, BundleStore, CertificateError, CertificateIssuer, CertificateLifecycleManager,
    CertificateState, IssuedCertificate, RenewalScheduler,
};
pub use reload::{LogOnly, PidFileTarget, ReloadTarget, SupervisedService};
