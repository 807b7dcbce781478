//! DNS-01 challenge support
//!
//! - [`DnsProvider`] publishes TXT records at a DNS hosting service
//! - [`PropagationChecker`] waits until resolvers see them
//! - [`Dns01Solver`] ties both together for one order

mod challenge;
mod digitalocean;
mod propagation;
mod provider;

pub use challenge::{Dns01Solver, PresentedRecord};
pub use digitalocean::DigitalOceanProvider;
pub use propagation::{parse_nameserver, PropagationChecker, PropagationConfig};
pub use provider::{
    challenge_record_fqdn, normalize_domain, DnsProvider, DnsProviderError, DnsResult,
    ACME_CHALLENGE_RECORD, CHALLENGE_TTL,
};
