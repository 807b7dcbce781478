//! DigitalOcean DNS provider
//!
//! Manages challenge TXT records through the DigitalOcean API v2.
//! API documentation: <https://docs.digitalocean.com/reference/api/api-reference/#tag/Domain-Records>

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::provider::{normalize_domain, DnsProvider, DnsProviderError, DnsResult, CHALLENGE_TTL};

/// DigitalOcean API base URL
pub const DIGITALOCEAN_API_BASE: &str = "https://api.digitalocean.com";

/// Default timeout for API calls
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Zones requested per page when listing domains
const DOMAINS_PER_PAGE: u32 = 200;

/// DigitalOcean DNS provider
pub struct DigitalOceanProvider {
    client: Client,
    token: String,
    base_url: String,
    /// Cache of domain -> zone name
    zone_cache: RwLock<HashMap<String, String>>,
}

impl DigitalOceanProvider {
    /// Create a provider authenticating with the API `token`
    pub fn new(token: &str) -> DnsResult<Self> {
        Self::with_base_url(token, DIGITALOCEAN_API_BASE)
    }

    /// Create a provider talking to an alternative API endpoint
    pub fn with_base_url(token: &str, base_url: &str) -> DnsResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_API_TIMEOUT)
            .build()
            .map_err(|e| {
                DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            zone_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Find the zone hosting `domain`
    async fn zone_for(&self, domain: &str) -> DnsResult<String> {
        let normalized = normalize_domain(domain);

        {
            let cache = self.zone_cache.read();
            if let Some(zone) = cache.get(normalized) {
                trace!(domain = %domain, zone = %zone, "Zone found in cache");
                return Ok(zone.clone());
            }
        }

        let zones = self.list_zones().await?;
        let zone = find_matching_zone(normalized, &zones)?.to_string();

        {
            let mut cache = self.zone_cache.write();
            cache.insert(normalized.to_string(), zone.clone());
        }

        debug!(domain = %domain, zone = %zone, "Found zone for domain");
        Ok(zone)
    }

    /// List every zone of the account, following pagination
    async fn list_zones(&self) -> DnsResult<Vec<String>> {
        let mut zones = Vec::new();
        let mut next = Some(format!(
            "{}/v2/domains?per_page={}",
            self.base_url, DOMAINS_PER_PAGE
        ));

        while let Some(url) = next.take() {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| request_error("Failed to list domains", e))?;

            let response = check_status(response, "Failed to list domains").await?;
            let page: DomainsResponse = response.json().await.map_err(|e| {
                DnsProviderError::ApiRequest(format!("Failed to parse domains response: {}", e))
            })?;

            zones.extend(page.domains.into_iter().map(|d| d.name));
            next = page.links.and_then(|l| l.pages).and_then(|p| p.next);
        }

        Ok(zones)
    }

    fn records_url(&self, zone: &str) -> String {
        format!("{}/v2/domains/{}/records", self.base_url, zone)
    }
}

#[async_trait]
impl DnsProvider for DigitalOceanProvider {
    fn name(&self) -> &'static str {
        "digitalocean"
    }

    async fn create_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
    ) -> DnsResult<String> {
        let zone = self.zone_for(domain).await?;
        let fqdn = format!("{}.{}", record_name, normalize_domain(domain));
        let relative_name = record_name_for_zone(&fqdn, &zone);

        debug!(
            domain = %domain,
            zone = %zone,
            record_name = %relative_name,
            "Creating TXT record"
        );

        let request = CreateRecordRequest {
            record_type: "TXT",
            name: &relative_name,
            data: record_value,
            ttl: CHALLENGE_TTL,
        };

        let response = self
            .client
            .post(self.records_url(&zone))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| DnsProviderError::RecordCreation {
                record_name: fqdn.clone(),
                message: e.to_string(),
            })?;

        let response = check_status(response, "Failed to create record").await?;
        let created: RecordResponse = response.json().await.map_err(|e| {
            DnsProviderError::RecordCreation {
                record_name: fqdn.clone(),
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        let record_id = created.domain_record.id.to_string();
        debug!(record_id = %record_id, record_name = %fqdn, "TXT record created");
        Ok(record_id)
    }

    async fn delete_txt_record(&self, domain: &str, record_id: &str) -> DnsResult<()> {
        let zone = self.zone_for(domain).await?;

        let response = self
            .client
            .delete(format!("{}/{}", self.records_url(&zone), record_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DnsProviderError::RecordDeletion {
                record_id: record_id.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(record_id = %record_id, "TXT record already gone");
            return Ok(());
        }

        check_status(response, "Failed to delete record").await?;
        debug!(record_id = %record_id, "TXT record deleted");
        Ok(())
    }
}

impl fmt::Debug for DigitalOceanProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOceanProvider")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Pick the longest zone that `domain` belongs to
fn find_matching_zone<'a>(domain: &str, zones: &'a [String]) -> DnsResult<&'a str> {
    let mut current = domain;
    loop {
        if let Some(zone) = zones.iter().find(|z| z.eq_ignore_ascii_case(current)) {
            return Ok(zone.as_str());
        }
        match current.find('.') {
            Some(pos) => current = &current[pos + 1..],
            None => {
                return Err(DnsProviderError::ZoneNotFound {
                    domain: domain.to_string(),
                })
            }
        }
    }
}

/// Record name relative to its zone (`@` for the apex)
fn record_name_for_zone(fqdn: &str, zone: &str) -> String {
    if fqdn == zone {
        "@".to_string()
    } else if let Some(stripped) = fqdn.strip_suffix(&format!(".{}", zone)) {
        stripped.to_string()
    } else {
        fqdn.to_string()
    }
}

fn request_error(context: &str, e: reqwest::Error) -> DnsProviderError {
    if e.is_timeout() {
        DnsProviderError::Timeout {
            elapsed_secs: DEFAULT_API_TIMEOUT.as_secs(),
        }
    } else {
        DnsProviderError::ApiRequest(format!("{}: {}", context, e))
    }
}

async fn check_status(response: Response, context: &str) -> DnsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DnsProviderError::Authentication(
            "DigitalOcean rejected the API token".to_string(),
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            Err(DnsProviderError::RateLimited { retry_after_secs })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(DnsProviderError::ApiRequest(format!(
                "{}: HTTP {} - {}",
                context, status, body
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DomainsResponse {
    domains: Vec<Domain>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Domain {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    data: &'a str,
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    domain_record: DomainRecord,
}

#[derive(Debug, Deserialize)]
struct DomainRecord {
    id: u64,
}
