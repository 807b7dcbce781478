//! Option names, default values and well-known ACME endpoints

/// Environment variable names
pub mod env {
    pub const DOMAINS: &str = "DOMAINS";
    pub const ACCOUNT_EMAIL: &str = "ACCOUNT_EMAIL";
    pub const ACCOUNT_KEY_FILE: &str = "ACCOUNT_KEY_FILE";
    pub const LE_TOS_AGREED: &str = "LE_TOS_AGREED";
    pub const CA_DIR: &str = "CA_DIR";
    pub const LE_CRT_KEY_TYPE: &str = "LE_CRT_KEY_TYPE";
    pub const FILENAME: &str = "FILENAME";
    pub const OUTPUT_DIRECTORY: &str = "OUTPUT_DIRECTORY";
    pub const DISABLE_CP: &str = "DISABLE_CP";
    pub const DNS_TIMEOUT: &str = "DNS_TIMEOUT";
    pub const DNS_RESOLVERS: &str = "DNS_RESOLVERS";
    pub const DNS_AUTH_TOKEN: &str = "DNS_AUTH_TOKEN";
    pub const DNS_AUTH_TOKEN_FILE: &str = "DNS_AUTH_TOKEN_FILE";
    pub const DNS_AUTH_TOKEN_VAULT: &str = "DNS_AUTH_TOKEN_VAULT";
    pub const DNS_AUTH_TOKEN_SECRET: &str = "DNS_AUTH_TOKEN_SECRET";
    pub const WEB_ROOT: &str = "WEB_ROOT";
    pub const WEB_ENABLED: &str = "WEB_ENABLED";
}

pub const ACCOUNT_KEY_FILE: &str = "./account.key";
pub const LE_TOS_AGREED: &str = "true";
pub const CA_DIR: &str = CA_STAGING;
pub const LE_CRT_KEY_TYPE: &str = KEY_TYPE_RSA2048;
pub const OUTPUT_DIRECTORY: &str = "./";
pub const DISABLE_CP: &str = "true";
pub const DNS_TIMEOUT: &str = "0";
pub const DNS_AUTH_TOKEN_SECRET: &str = "do-auth-token";
pub const WEB_ROOT: &str = "./www";
pub const WEB_ENABLED: &str = "false";

/// Well-known CA directory names accepted by `CA_DIR`
pub const CA_PRODUCTION: &str = "PRODUCTION";
pub const CA_STAGING: &str = "STAGING";
pub const CA_TEST: &str = "TEST";

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";
/// Local Pebble/Boulder instance used for development
pub const LOCAL_TEST_DIRECTORY: &str = "http://localhost:4000/directory";

pub const KEY_TYPE_RSA2048: &str = "RSA2048";
pub const KEY_TYPE_RSA4096: &str = "RSA4096";
pub const KEY_TYPE_RSA8192: &str = "RSA8192";

/// Host template for bare key vault names
pub const VAULT_HOST_SUFFIX: &str = "vault.azure.net";
