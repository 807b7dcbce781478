//! DNS propagation checking for DNS-01 challenges
//!
//! Polls recursive resolvers until the challenge TXT record is visible. When
//! full propagation is required, every authoritative nameserver of the zone
//! must serve the record too.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::{Resolver, TokioResolver};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::provider::{challenge_record_fqdn, DnsProviderError, DnsResult};

/// Default DNS port
const DNS_PORT: u16 = 53;

/// Per-query timeout when none is configured
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for propagation checking
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Delay before first check
    pub initial_delay: Duration,
    /// Interval between checks
    pub check_interval: Duration,
    /// Maximum time to wait for propagation
    pub timeout: Duration,
    /// Recursive nameservers to query (empty = system resolvers)
    pub nameservers: Vec<SocketAddr>,
    /// Timeout of a single DNS query
    pub query_timeout: Duration,
    /// Also require every authoritative nameserver to serve the record
    pub require_authoritative: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            check_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(90),
            nameservers: Vec::new(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            require_authoritative: false,
        }
    }
}

impl PropagationConfig {
    /// Build the configuration from operator settings
    ///
    /// `resolvers` are `host[:port]` entries; a zero `query_timeout` keeps the
    /// default.
    pub async fn from_settings(
        resolvers: &[String],
        query_timeout: Duration,
        require_authoritative: bool,
    ) -> DnsResult<Self> {
        let mut nameservers = Vec::new();
        for entry in resolvers {
            nameservers.extend(parse_nameserver(entry).await?);
        }

        Ok(Self {
            nameservers,
            query_timeout: if query_timeout.is_zero() {
                DEFAULT_QUERY_TIMEOUT
            } else {
                query_timeout
            },
            require_authoritative,
            ..Self::default()
        })
    }
}

/// Resolve a `host[:port]` nameserver entry, port 53 by default
pub async fn parse_nameserver(entry: &str) -> DnsResult<Vec<SocketAddr>> {
    let entry = entry.trim();
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, DNS_PORT)]);
    }

    let (host, port) = match entry.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DnsProviderError::Configuration(format!("Invalid nameserver port in '{}'", entry))
            })?;
            (host, port)
        }
        None => (entry, DNS_PORT),
    };

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            DnsProviderError::Configuration(format!("Cannot resolve nameserver '{}': {}", entry, e))
        })?
        .collect();

    if addrs.is_empty() {
        return Err(DnsProviderError::Configuration(format!(
            "Nameserver '{}' has no address",
            entry
        )));
    }
    Ok(addrs)
}

/// DNS propagation checker
#[derive(Debug)]
pub struct PropagationChecker {
    config: PropagationConfig,
    resolver: TokioResolver,
}

impl PropagationChecker {
    /// Create a propagation checker with the given configuration
    ///
    /// Without configured nameservers the system resolvers from
    /// `/etc/resolv.conf` are queried.
    pub fn new(config: PropagationConfig) -> DnsResult<Self> {
        let resolver = build_resolver(&config.nameservers, &config, true)?;
        Ok(Self { config, resolver })
    }

    /// Get the configuration
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Wait until the challenge record of `domain` holds `expected_value`
    pub async fn wait_for_propagation(&self, domain: &str, expected_value: &str) -> DnsResult<()> {
        let record_name = challenge_record_fqdn(domain);
        let start = Instant::now();
        let deadline = start + self.config.timeout;

        debug!(
            record = %record_name,
            timeout_secs = self.config.timeout.as_secs(),
            authoritative = self.config.require_authoritative,
            "Waiting for DNS propagation"
        );

        tokio::time::sleep(self.config.initial_delay).await;

        loop {
            match self.is_propagated(&record_name, expected_value).await {
                Ok(true) => {
                    debug!(
                        record = %record_name,
                        elapsed_secs = start.elapsed().as_secs(),
                        "DNS propagation confirmed"
                    );
                    return Ok(());
                }
                Ok(false) => {
                    trace!(record = %record_name, "Record not yet propagated");
                }
                Err(e) => {
                    warn!(record = %record_name, error = %e, "DNS lookup error");
                }
            }

            if Instant::now() > deadline {
                return Err(DnsProviderError::Timeout {
                    elapsed_secs: self.config.timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.config.check_interval).await;
        }
    }

    async fn is_propagated(&self, record_name: &str, expected_value: &str) -> DnsResult<bool> {
        if !check_record(&self.resolver, record_name, expected_value).await? {
            return Ok(false);
        }
        if !self.config.require_authoritative {
            return Ok(true);
        }

        let nameservers = self.authoritative_nameservers(record_name).await?;
        for ns in &nameservers {
            let resolver = build_resolver(std::slice::from_ref(ns), &self.config, false)?;
            if !check_record(&resolver, record_name, expected_value).await? {
                trace!(record = %record_name, nameserver = %ns, "Authoritative nameserver lacks record");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Addresses of the nameservers authoritative for the zone of `name`
    async fn authoritative_nameservers(&self, name: &str) -> DnsResult<Vec<SocketAddr>> {
        let mut candidate = name.trim_end_matches('.');
        loop {
            if let Ok(lookup) = self.resolver.ns_lookup(candidate).await {
                let hosts: Vec<String> = lookup.iter().map(|ns| ns.to_string()).collect();
                if !hosts.is_empty() {
                    trace!(zone = %candidate, nameservers = ?hosts, "Found authoritative nameservers");
                    let mut addrs = Vec::new();
                    for host in &hosts {
                        match self.resolver.lookup_ip(host.as_str()).await {
                            Ok(ips) => {
                                addrs.extend(ips.iter().map(|ip| SocketAddr::new(ip, DNS_PORT)))
                            }
                            Err(e) => warn!(nameserver = %host, error = %e, "Cannot resolve nameserver"),
                        }
                    }
                    if addrs.is_empty() {
                        break;
                    }
                    return Ok(addrs);
                }
            }
            match candidate.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => candidate = parent,
                _ => break,
            }
        }

        Err(DnsProviderError::ZoneNotFound {
            domain: name.to_string(),
        })
    }
}

/// Nameserver configuration for `nameservers`, the system's when empty
fn resolver_config(nameservers: &[SocketAddr]) -> DnsResult<ResolverConfig> {
    if nameservers.is_empty() {
        let (config, _) = read_system_conf().map_err(|e| {
            DnsProviderError::Configuration(format!(
                "Cannot read system resolver configuration: {}",
                e
            ))
        })?;
        return Ok(config);
    }

    let mut config = ResolverConfig::new();
    for addr in nameservers {
        config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
    }
    Ok(config)
}

/// Build a resolver querying `nameservers`
fn build_resolver(
    nameservers: &[SocketAddr],
    config: &PropagationConfig,
    recursion_desired: bool,
) -> DnsResult<TokioResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.query_timeout;
    opts.attempts = 2;
    opts.cache_size = 0; // Every poll must hit the network
    opts.recursion_desired = recursion_desired;

    let resolver_config = resolver_config(nameservers)?;
    Ok(
        Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
            .with_options(opts)
            .build(),
    )
}

/// Whether any TXT record at `record_name` equals `expected_value`
async fn check_record(
    resolver: &TokioResolver,
    record_name: &str,
    expected_value: &str,
) -> DnsResult<bool> {
    match resolver.txt_lookup(record_name).await {
        Ok(records) => {
            for record in records.iter() {
                // TXT records can hold several strings
                let value: String = record
                    .txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect();

                if value == expected_value {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Err(e) => {
            // NXDOMAIN and empty answers are expected while the record propagates
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("no records found")
                || err_str.contains("nxdomain")
                || err_str.contains("no connections available")
                || err_str.contains("record not found")
            {
                Ok(false)
            } else {
                Err(DnsProviderError::ApiRequest(format!(
                    "DNS lookup failed for '{}': {}",
                    record_name, e
                )))
            }
        }
    }
}
