//! Reload a service whose process id is kept in a pid file

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::signals::{send_signal, SignalType};
use super::{ReloadError, ReloadTarget};

/// Sends SIGHUP to the pid read from a file at reload time
#[derive(Debug, Clone)]
pub struct PidFileTarget {
    path: PathBuf,
}

impl PidFileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the pid; the file is re-read on every reload since the
    /// service may have restarted
    pub fn read_pid(&self) -> Result<i32, ReloadError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ReloadError::PidFile {
            path: self.path.clone(),
            source,
        })?;

        let trimmed = content.trim();
        match trimmed.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(pid),
            _ => Err(ReloadError::InvalidPid {
                path: self.path.clone(),
                content: trimmed.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ReloadTarget for PidFileTarget {
    fn describe(&self) -> String {
        format!("pid file {}", self.path.display())
    }

    async fn reload(&self) -> Result<(), ReloadError> {
        let pid = self.read_pid()?;
        send_signal(pid, SignalType::Reload)?;
        info!(pid, pid_file = %self.path.display(), "Sent SIGHUP to service");
        Ok(())
    }
}
