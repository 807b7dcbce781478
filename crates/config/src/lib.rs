//! Configuration loading and validation for certsmith
//!
//! Operator input arrives as one string per option, read from the environment
//! with defaults applied ([`RawConfiguration`]). [`ConfigResolver`] turns it
//! into a fully validated [`ResolvedConfiguration`] or the first
//! [`ConfigError`] encountered. Nothing partially valid is ever returned.
//!
//! Resolution has two observable side effects: the account key is generated
//! and written when the key file does not exist yet, and the output directory
//! is created.

pub mod account_key;
pub mod defaults;
pub mod domain;
pub mod errors;
pub mod raw;
pub mod resolver;

pub use account_key::AccountKey;
pub use domain::{sanitize_domain, split_list};
pub use errors::ConfigError;
pub use raw::RawConfiguration;
pub use resolver::{
    parse_bool, resolve, ConfigResolver, CredentialSource, KeyAlgorithm, ResolvedConfiguration,
    WebConfig,
};
