//! Stored OAuth access tokens for the member API.
//!
//! Tokens are obtained outside of this crate and kept in a YAML file keyed
//! by ORCID iD:
//!
//! ```yaml
//! 0000-0002-1825-0097:
//!   access_token: 1f2e3d4c-...
//!   token_type: bearer
//!   scope: /activities/update /read-limited
//! ```
//!
//! The store is loaded once, and written back whenever it changes.

use crate::registry::OrcidId;
use crate::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One stored token response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Account name returned with the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// The first eight characters of the token followed by `...`.
    pub fn masked(&self) -> String {
        let prefix: String = self.access_token.chars().take(8).collect();
        format!("{prefix}...")
    }
}

/// Access tokens by ORCID iD, optionally backed by a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStore {
    path: Option<PathBuf>,
    tokens: BTreeMap<String, StoredToken>,
}

impl TokenStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the store from `path`; a missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tokens = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_yaml::from_str::<Option<BTreeMap<String, StoredToken>>>(&text)?
                .unwrap_or_default(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no token file yet");
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path),
            tokens,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, id: &OrcidId) -> Option<&StoredToken> {
        self.tokens.get(id.as_str())
    }

    /// The access token for `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingToken`] when no non-empty token is stored.
    pub fn access_token(&self, id: &OrcidId) -> std::result::Result<&str, RegistryError> {
        self.get(id)
            .map(|token| token.access_token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RegistryError::MissingToken(id.to_string()))
    }

    /// Stores a token and persists the store.
    pub fn insert(&mut self, id: &OrcidId, token: StoredToken) -> Result<()> {
        self.tokens.insert(id.to_string(), token);
        self.persist()
    }

    /// Removes a token and persists the store. Returns whether one was stored.
    pub fn remove(&mut self, id: &OrcidId) -> Result<bool> {
        let removed = self.tokens.remove(id.as_str()).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Stored iDs with their tokens, in iD order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &StoredToken)> {
        self.tokens.iter().map(|(id, token)| (id.as_str(), token))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(&self.tokens)?)?;
        restrict_permissions(path)?;
        info!(path = %path.display(), tokens = self.tokens.len(), "saved token store");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
