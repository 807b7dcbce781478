//! The service certsmith starts and supervises as a child process

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::signals::{send_signal, SignalType};
use super::{ReloadError, ReloadTarget};

/// A child process that gets SIGHUP whenever the bundle changes
#[derive(Debug)]
pub struct SupervisedService {
    command: String,
    pid: i32,
    child: Mutex<Child>,
    exited: AtomicBool,
}

impl SupervisedService {
    /// Start `program` with `args`, inheriting stdio and environment
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, ReloadError> {
        let command = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                command: command.clone(),
                source,
            })?;

        let pid = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .ok_or(ReloadError::NotRunning)?;

        info!(pid, command = %command, "Started service");

        Ok(Self {
            command,
            pid,
            child: Mutex::new(child),
            exited: AtomicBool::new(false),
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the service to exit
    ///
    /// Cancel-safe: dropping the future leaves the child running.
    pub async fn wait(&self) -> std::io::Result<ExitStatus> {
        let status = self.child.lock().await.wait().await?;
        self.exited.store(true, Ordering::SeqCst);
        info!(pid = self.pid, status = %status, "Service exited");
        Ok(status)
    }

    /// Send SIGTERM and wait up to `grace` before killing the process
    pub async fn terminate(&self, grace: Duration) -> std::io::Result<ExitStatus> {
        if !self.exited.load(Ordering::SeqCst) {
            if let Err(e) = send_signal(self.pid, SignalType::Shutdown) {
                warn!(pid = self.pid, error = %e, "Failed to send SIGTERM to service");
            }
        }

        match tokio::time::timeout(grace, self.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_secs = grace.as_secs(),
                    "Service ignored SIGTERM, killing it"
                );
                let mut child = self.child.lock().await;
                child.kill().await?;
                let status = child.wait().await?;
                self.exited.store(true, Ordering::SeqCst);
                Ok(status)
            }
        }
    }
}

#[async_trait]
impl ReloadTarget for SupervisedService {
    fn describe(&self) -> String {
        format!("child process {} ({})", self.pid, self.command)
    }

    async fn reload(&self) -> Result<(), ReloadError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(ReloadError::NotRunning);
        }
        send_signal(self.pid, SignalType::Reload)?;
        debug!(pid = self.pid, "Sent SIGHUP to service");
        Ok(())
    }
}

/// Exit code to report for a finished service, shell style for signals
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
