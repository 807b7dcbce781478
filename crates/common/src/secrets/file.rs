//! File-backed secret store

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{strip_trailing_newline, FileSecretSource, SecretError, SecretResult};

/// Reads a token from a local file
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl FileStore {
    /// Create a new file store
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSecretSource for FileStore {
    async fn get_token(&self, path: &Path) -> SecretResult<String> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SecretError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = tokio::fs::metadata(path).await {
                let mode = metadata.permissions().mode() & 0o777;
                if mode & 0o077 != 0 {
                    warn!(
                        path = %path.display(),
                        mode = format!("{:o}", mode),
                        "Secret file is readable by group or others (should be 0600 or 0400)"
                    );
                }
            }
        }

        let token = strip_trailing_newline(&raw);
        if token.is_empty() {
            return Err(SecretError::EmptySecret {
                location: path.display().to_string(),
            });
        }

        debug!(path = %path.display(), "Loaded secret from file");
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_token_and_strips_newline() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "file-token").unwrap();

        let token = FileStore::new().get_token(file.path()).await.unwrap();
        assert_eq!(token, "file-token");
    }

    #[tokio::test]
    async fn test_keeps_inner_whitespace() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  spaced token  ").unwrap();

        let token = FileStore::new().get_token(file.path()).await.unwrap();
        assert_eq!(token, "  spaced token  ");
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let file = NamedTempFile::new().unwrap();

        let err = FileStore::new().get_token(file.path()).await.unwrap_err();
        assert!(matches!(err, SecretError::EmptySecret { .. }));
    }

    #[tokio::test]
    async fn test_newline_only_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file).unwrap();

        let err = FileStore::new().get_token(file.path()).await.unwrap_err();
        assert!(matches!(err, SecretError::EmptySecret { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = FileStore::new()
            .get_token(Path::new("/nonexistent/path/to/token"))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/path/to/token"));
    }
}
