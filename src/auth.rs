use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// A persisted sign-in as handed over by the authentication backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Who is operating the camera, passed explicitly to whatever needs it.
///
/// The credential lives in memory and in a JSON file at `path`; signing out
/// removes both.
pub struct AuthContext {
    path: PathBuf,
    credential: RwLock<Option<Credential>>,
}

impl AuthContext {
    /// Restore the persisted credential, if any. An unreadable file signs the
    /// context out instead of failing.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let credential = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Credential>(&contents) {
                Ok(credential) => Some(credential),
                Err(err) => {
                    log_warn!("ignoring unreadable credential at {}: {err}", path.display());
                    None
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read credential from {}", path.display()))
            }
        };

        Ok(Self {
            path,
            credential: RwLock::new(credential),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sign_in(&self, credential: Credential) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&credential)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write credential to {}", self.path.display()))?;

        log_info!("signed in as {}", credential.user_id);
        *self.write() = Some(credential);
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.write().take();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to remove credential at {}", self.path.display())
                })
            }
        }
        log_info!("signed out");
        Ok(())
    }

    /// Token to attach to outgoing requests, `None` once expired.
    pub fn bearer_token(&self) -> Option<String> {
        self.bearer_token_at(Utc::now())
    }

    pub fn bearer_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.live_credential(now).map(|credential| credential.token)
    }

    pub fn operator_id(&self) -> Option<String> {
        self.live_credential(Utc::now())
            .map(|credential| credential.user_id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.live_credential(Utc::now()).is_some()
    }

    fn live_credential(&self, now: DateTime<Utc>) -> Option<Credential> {
        let guard = self
            .credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .as_ref()
            .filter(|credential| !credential.is_expired_at(now))
            .cloned()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Credential>> {
        self.credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
