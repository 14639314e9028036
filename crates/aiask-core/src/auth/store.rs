use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{DeviceFlow, PlatformToken};

/// Single-credential file cache for the long-lived platform token.
///
/// The file holds the raw token text. There is no freshness check: a cached
/// token is returned as-is until a new authentication overwrites it.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing or empty file is a miss, not an error.
    pub fn load(&self) -> Result<Option<PlatformToken>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cached token");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read token file {}", self.path.display())
                })
            }
        };

        let token = contents.trim();
        if token.is_empty() {
            debug!(path = %self.path.display(), "Token file is empty");
            return Ok(None);
        }
        Ok(Some(PlatformToken::new(token)))
    }

    /// Return the cached token, running the device flow on a miss.
    pub async fn get(&self, flow: &DeviceFlow) -> Result<PlatformToken> {
        if let Some(token) = self.load()? {
            debug!(token = ?token, "Using cached token");
            return Ok(token);
        }
        info!(path = %self.path.display(), "No usable cached token, starting device flow");
        flow.authorize(self).await
    }

    /// Persist `token`, replacing any previous value.
    ///
    /// The token is written to a sibling file and renamed into place, so a
    /// concurrent reader sees either the old token or the new one.
    pub fn save(&self, token: &PlatformToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create token directory {}", parent.display())
            })?;
        }

        let staging = self.staging_path();
        std::fs::write(&staging, token.as_str())
            .with_context(|| format!("Failed to write token file {}", staging.display()))?;
        restrict_permissions(&staging)?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace token file {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Token saved");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
