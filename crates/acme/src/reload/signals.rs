//! Signal handling for service reload and shutdown.
//!
//! SIGHUP is what services conventionally take as "reload", SIGTERM and
//! SIGINT end certsmith itself.

use std::future::Future;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tracing::{debug, trace};

use super::ReloadError;

/// Signals certsmith sends or reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Reload configuration (SIGHUP)
    Reload,
    /// Graceful shutdown (SIGTERM)
    Shutdown,
}

impl SignalType {
    fn as_nix(self) -> Signal {
        match self {
            SignalType::Reload => Signal::SIGHUP,
            SignalType::Shutdown => Signal::SIGTERM,
        }
    }
}

/// Deliver `signal` to process `pid`
pub fn send_signal(pid: i32, signal: SignalType) -> Result<(), ReloadError> {
    trace!(pid, signal = ?signal, "Sending signal");
    kill(Pid::from_raw(pid), signal.as_nix()).map_err(|source| ReloadError::Signal {
        pid,
        signal,
        source,
    })
}

/// Resolves when certsmith is asked to stop
pub struct ShutdownSignal {
    terminate: SignalStream,
    interrupt: SignalStream,
}

impl ShutdownSignal {
    /// Register the SIGTERM and SIGINT handlers
    ///
    /// Must be called inside the runtime; handlers stay installed for the
    /// rest of the process.
    pub fn register() -> std::io::Result<Self> {
        debug!("Registering shutdown signal handlers");
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next SIGTERM or SIGINT
    pub async fn recv(&mut self) -> SignalType {
        tokio::select! {
            _ = self.terminate.recv() => debug!("Received SIGTERM"),
            _ = self.interrupt.recv() => debug!("Received SIGINT"),
        }
        SignalType::Shutdown
    }

    /// Run `work` unless SIGTERM or SIGINT arrives first
    ///
    /// Returns `None` when interrupted, dropping `work`.
    pub async fn interrupt<F: Future>(&mut self, work: F) -> Option<F::Output> {
        tokio::select! {
            output = work => Some(output),
            _ = self.recv() => None,
        }
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mapping() {
        assert_eq!(SignalType::Reload.as_nix(), Signal::SIGHUP);
        assert_eq!(SignalType::Shutdown.as_nix(), Signal::SIGTERM);
    }

    #[tokio::test]
    async fn test_interrupt_stops_pending_work() {
        let mut shutdown = ShutdownSignal::register().unwrap();

        // Handlers are installed, so this does not kill the test process
        send_signal(std::process::id() as i32, SignalType::Shutdown).unwrap();

        let work = tokio::time::sleep(std::time::Duration::from_secs(30));
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            shutdown.interrupt(work),
        )
        .await
        .expect("signal interrupts the work");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_interrupt_returns_finished_work() {
        let mut shutdown = ShutdownSignal::register().unwrap();
        assert_eq!(shutdown.interrupt(async { 7 }).await, Some(7));
    }

    #[test]
    fn test_send_signal_to_missing_process() {
        // Pid far above any default pid_max
        let err = send_signal(i32::MAX, SignalType::Reload).unwrap_err();
        assert!(matches!(err, ReloadError::Signal { pid: i32::MAX, .. }));
    }
}
