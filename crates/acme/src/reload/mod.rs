//! Notifying the TLS-consuming service about a new certificate
//!
//! A [`ReloadTarget`] is told once per written bundle. It never learns why,
//! only that the files changed.

use std::fmt::Debug;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

mod pid_file;
mod signals;
mod supervisor;

pub use pid_file::PidFileTarget;
pub use signals::{send_signal, ShutdownSignal, SignalType};
pub use supervisor::{exit_code, SupervisedService};

/// Errors raised while notifying a service
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The pid file could not be read
    #[error("Failed to read pid file {}: {source}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The pid file does not hold a process id
    #[error("Pid file {} does not contain a valid pid: '{content}'", path.display())]
    InvalidPid { path: PathBuf, content: String },

    /// Sending the signal failed
    #[error("Failed to send {signal:?} to pid {pid}: {source}")]
    Signal {
        pid: i32,
        signal: SignalType,
        #[source]
        source: nix::errno::Errno,
    },

    /// The supervised process is gone
    #[error("Service process is not running")]
    NotRunning,

    /// The service command could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Something to notify after the certificate bundle changed
#[async_trait]
pub trait ReloadTarget: Send + Sync + Debug {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Ask the service to pick up the new bundle
    async fn reload(&self) -> Result<(), ReloadError>;
}

/// Target that only logs, for deployments where the service watches the files
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnly;

#[async_trait]
impl ReloadTarget for LogOnly {
    fn describe(&self) -> String {
        "log only".to_string()
    }

    async fn reload(&self) -> Result<(), ReloadError> {
        info!("Certificate bundle changed, no service to notify");
        Ok(())
    }
}
