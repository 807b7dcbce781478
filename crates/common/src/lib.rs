//! Common utilities and shared components for certsmith
//!
//! This crate provides functionality shared by the configuration resolver and
//! the certificate lifecycle daemon.
//!
//! # Module Organization
//!
//! - [`secrets`]: Secret sources (file, key vault, in-process) and the registry
//!   the configuration resolver reads credentials through
//! - [`observability`]: Logging and tracing initialisation

pub mod observability;
pub mod secrets;

pub use observability::init_tracing;

pub use secrets::{
    AzureKeyVault, FileSecretSource, FileStore, SecretError, SecretRegistry, SecretResult,
    StaticSecretSource, VaultSecretSource,
};
