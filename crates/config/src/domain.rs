//! Domain list handling

use crate::errors::ConfigError;

/// Turn a domain name into a string usable as a file name
///
/// Wildcard labels become `_` and the result is converted to its ASCII
/// (punycode) form, so `*.bücher.example` yields `_.xn--bcher-kva.example`.
pub fn sanitize_domain(domain: &str) -> Result<String, ConfigError> {
    let replaced = domain.replace('*', "_");
    idna::domain_to_ascii(&replaced).map_err(|e| ConfigError::InvalidDomain {
        domain: domain.to_string(),
        reason: e.to_string(),
    })
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
