//! Unvalidated operator input
//!
//! One string per recognised option. A variable that is present in the
//! environment always wins over the default, even when it is empty.

use std::fmt;

use serde::Deserialize;

use crate::defaults;
use crate::errors::ConfigError;

/// Operator input as read from the environment, defaults applied
///
/// Field names map to upper-case environment variables (`account_email` is
/// read from `ACCOUNT_EMAIL`).
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct RawConfiguration {
    #[serde(default)]
    pub domains: String,
    #[serde(default)]
    pub account_email: String,
    #[serde(default = "default_account_key_file")]
    pub account_key_file: String,
    #[serde(default = "default_le_tos_agreed")]
    pub le_tos_agreed: String,
    #[serde(default = "default_ca_dir")]
    pub ca_dir: String,
    #[serde(default = "default_le_crt_key_type")]
    pub le_crt_key_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_disable_cp")]
    pub disable_cp: String,
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout: String,
    #[serde(default)]
    pub dns_resolvers: String,
    #[serde(default)]
    pub dns_auth_token: String,
    #[serde(default)]
    pub dns_auth_token_file: String,
    #[serde(default)]
    pub dns_auth_token_vault: String,
    #[serde(default = "default_dns_auth_token_secret")]
    pub dns_auth_token_secret: String,
    #[serde(default = "default_web_root")]
    pub web_root: String,
    #[serde(default = "default_web_enabled")]
    pub web_enabled: String,
}

fn default_account_key_file() -> String {
    defaults::ACCOUNT_KEY_FILE.to_string()
}

fn default_le_tos_agreed() -> String {
    defaults::LE_TOS_AGREED.to_string()
}

fn default_ca_dir() -> String {
    defaults::CA_DIR.to_string()
}

fn default_le_crt_key_type() -> String {
    defaults::LE_CRT_KEY_TYPE.to_string()
}

fn default_output_directory() -> String {
    defaults::OUTPUT_DIRECTORY.to_string()
}

fn default_disable_cp() -> String {
    defaults::DISABLE_CP.to_string()
}

fn default_dns_timeout() -> String {
    defaults::DNS_TIMEOUT.to_string()
}

fn default_dns_auth_token_secret() -> String {
    defaults::DNS_AUTH_TOKEN_SECRET.to_string()
}

fn default_web_root() -> String {
    defaults::WEB_ROOT.to_string()
}

fn default_web_enabled() -> String {
    defaults::WEB_ENABLED.to_string()
}

impl RawConfiguration {
    /// Read every option from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<RawConfiguration>()?)
    }

    /// Read every option from an explicit set of `(NAME, value)` pairs
    ///
    /// Unrecognised names are ignored, exactly as with the real environment.
    pub fn from_iter<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into()));
        Ok(envy::from_iter::<_, RawConfiguration>(vars)?)
    }
}

impl Default for RawConfiguration {
    fn default() -> Self {
        Self {
            domains: String::new(),
            account_email: String::new(),
            account_key_file: default_account_key_file(),
            le_tos_agreed: default_le_tos_agreed(),
            ca_dir: default_ca_dir(),
            le_crt_key_type: default_le_crt_key_type(),
            filename: String::new(),
            output_directory: default_output_directory(),
            disable_cp: default_disable_cp(),
            dns_timeout: default_dns_timeout(),
            dns_resolvers: String::new(),
            dns_auth_token: String::new(),
            dns_auth_token_file: String::new(),
            dns_auth_token_vault: String::new(),
            dns_auth_token_secret: default_dns_auth_token_secret(),
            web_root: default_web_root(),
            web_enabled: default_web_enabled(),
        }
    }
}

impl fmt::Debug for RawConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.dns_auth_token.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("RawConfiguration")
            .field("domains", &self.domains)
            .field("account_email", &self.account_email)
            .field("account_key_file", &self.account_key_file)
            .field("le_tos_agreed", &self.le_tos_agreed)
            .field("ca_dir", &self.ca_dir)
            .field("le_crt_key_type", &self.le_crt_key_type)
            .field("filename", &self.filename)
            .field("output_directory", &self.output_directory)
            .field("disable_cp", &self.disable_cp)
            .field("dns_timeout", &self.dns_timeout)
            .field("dns_resolvers", &self.dns_resolvers)
            .field("dns_auth_token", &token)
            .field("dns_auth_token_file", &self.dns_auth_token_file)
            .field("dns_auth_token_vault", &self.dns_auth_token_vault)
            .field("dns_auth_token_secret", &self.dns_auth_token_secret)
            .field("web_root", &self.web_root)
            .field("web_enabled", &self.web_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let raw = RawConfiguration::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(raw, RawConfiguration::default());
        assert_eq!(raw.account_key_file, "./account.key");
        assert_eq!(raw.le_tos_agreed, "true");
        assert_eq!(raw.ca_dir, "STAGING");
        assert_eq!(raw.le_crt_key_type, "RSA2048");
        assert_eq!(raw.output_directory, "./");
        assert_eq!(raw.disable_cp, "true");
        assert_eq!(raw.dns_timeout, "0");
        assert_eq!(raw.dns_auth_token_secret, "do-auth-token");
        assert_eq!(raw.web_root, "./www");
        assert_eq!(raw.web_enabled, "false");
        assert!(raw.domains.is_empty());
        assert!(raw.account_email.is_empty());
    }

    #[test]
    fn test_reads_upper_case_names() {
        let raw = RawConfiguration::from_iter([
            ("DOMAINS", "example.com,www.example.com"),
            ("ACCOUNT_EMAIL", "ops@example.com"),
            ("CA_DIR", "PRODUCTION"),
            ("DNS_AUTH_TOKEN_VAULT", "my-vault"),
            ("UNRELATED", "ignored"),
        ])
        .unwrap();

        assert_eq!(raw.domains, "example.com,www.example.com");
        assert_eq!(raw.account_email, "ops@example.com");
        assert_eq!(raw.ca_dir, "PRODUCTION");
        assert_eq!(raw.dns_auth_token_vault, "my-vault");
    }

    #[test]
    fn test_present_but_empty_overrides_default() {
        let raw = RawConfiguration::from_iter([("LE_TOS_AGREED", "")]).unwrap();
        assert_eq!(raw.le_tos_agreed, "");
    }

    #[test]
    fn test_debug_redacts_inline_token() {
        let raw = RawConfiguration {
            dns_auth_token: "do-secret-value".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", raw);
        assert!(!debug.contains("do-secret-value"));
        assert!(debug.contains("<redacted>"));
    }
}
