//! On-disk session storage: one JSON file holding the current session.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use auth::{GatewayError, Session};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stored session, if any. An unreadable file counts as signed out.
    pub async fn load(&self) -> Result<Option<Session>, GatewayError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GatewayError::Storage(e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), GatewayError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GatewayError::Storage(e.to_string()))?;
        }
        let body = serde_json::to_vec_pretty(session).map_err(|e| GatewayError::Storage(e.to_string()))?;
        let mut file = create_private(&self.path).await?;
        file.write_all(&body).await.map_err(|e| GatewayError::Storage(e.to_string()))?;
        file.flush().await.map_err(|e| GatewayError::Storage(e.to_string()))?;
        // `mode` only applies on creation; an older file may be wider.
        restrict_permissions(&self.path).await
    }

    pub async fn clear(&self) -> Result<(), GatewayError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Storage(e.to_string())),
        }
    }
}

/// Open `path` for a fresh write, creating it owner-only.
async fn create_private(path: &Path) -> Result<File, GatewayError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await.map_err(|e| GatewayError::Storage(e.to_string()))
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), GatewayError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| GatewayError::Storage(e.to_string()))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), GatewayError> {
    Ok(())
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
