//! Certificate issuer abstraction

use std::fmt;

use async_trait::async_trait;

use super::error::AcmeError;

const PEM_CERTIFICATE: &str = "CERTIFICATE";

/// PEM artifacts delivered by an issuer
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// Full chain, leaf first
    pub certificate: String,
    /// Private key of the leaf certificate
    pub private_key: String,
    /// The chain without the leaf
    pub issuer_certificate: String,
}

impl IssuedCertificate {
    /// Build the artifacts from a PEM chain as returned by the CA
    ///
    /// Non-certificate blocks are ignored. The chain must hold at least one
    /// certificate.
    pub fn from_chain(chain_pem: &str, private_key: String) -> Result<Self, AcmeError> {
        let blocks = pem::parse_many(chain_pem)
            .map_err(|e| AcmeError::CertificateParse(e.to_string()))?;
        let certificates: Vec<pem::Pem> = blocks
            .into_iter()
            .filter(|block| block.tag() == PEM_CERTIFICATE)
            .collect();

        let Some((_, issuers)) = certificates.split_first() else {
            return Err(AcmeError::CertificateParse(
                "certificate chain is empty".to_string(),
            ));
        };

        Ok(Self {
            certificate: pem::encode_many(&certificates),
            private_key,
            issuer_certificate: pem::encode_many(issuers),
        })
    }
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"<redacted>")
            .field("issuer_certificate_len", &self.issuer_certificate.len())
            .finish()
    }
}

/// Something that can register an account and obtain certificates
///
/// The production implementation is [`AcmeIssuer`](super::AcmeIssuer).
#[async_trait]
pub trait CertificateIssuer: Send + Sync + fmt::Debug {
    /// Register (or look up) the account with the CA
    async fn register(&self) -> Result<(), AcmeError>;

    /// Obtain a certificate covering every name in `domains`
    async fn obtain(&self, domains: &[String]) -> Result<IssuedCertificate, AcmeError>;
}
