//! Persisted authentication state.
//!
//! The browser-side storage snapshot (`state.json`) is an opaque record:
//! this module only existence-checks it and records when authentication
//! last succeeded. Its internal schema belongs to the browser layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// State files older than this likely need a fresh login.
const STALE_AFTER_DAYS: i64 = 7;

/// Metadata recorded beside the state file after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    /// When authentication last succeeded.
    pub authenticated_at: DateTime<Utc>,
}

/// Current authentication status.
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether a state file exists.
    pub authenticated: bool,
    /// Age of the state file, if it exists.
    pub state_age: Option<chrono::Duration>,
    /// When authentication last succeeded, if recorded.
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl AuthStatus {
    /// Whether the stored state is old enough to warrant re-login.
    pub fn is_stale(&self) -> bool {
        self.state_age
            .map(|age| age > chrono::Duration::days(STALE_AFTER_DAYS))
            .unwrap_or(false)
    }
}

/// Reads and writes auth state/metadata at their conventional paths.
#[derive(Debug, Clone)]
pub struct AuthStore {
    state_file: PathBuf,
    auth_info_file: PathBuf,
}

impl AuthStore {
    /// Create a store over the configured storage locations.
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            state_file: storage.state_file(),
            auth_info_file: storage.auth_info_file(),
        }
    }

    /// Path of the opaque browser state file.
    pub fn state_file(&self) -> &std::path::Path {
        &self.state_file
    }

    /// Whether stored authentication exists (existence check only).
    pub fn is_authenticated(&self) -> bool {
        self.state_file.exists()
    }

    /// Current status, including staleness.
    pub fn status(&self) -> AuthStatus {
        let state_age = self
            .state_file
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .and_then(|elapsed| chrono::Duration::from_std(elapsed).ok());

        let authenticated_at = std::fs::read_to_string(&self.auth_info_file)
            .ok()
            .and_then(|raw| serde_json::from_str::<AuthInfo>(&raw).ok())
            .map(|info| info.authenticated_at);

        let status = AuthStatus {
            authenticated: self.is_authenticated(),
            state_age,
            authenticated_at,
        };
        if status.is_stale() {
            tracing::warn!(
                days = status.state_age.map(|a| a.num_days()).unwrap_or_default(),
                "stored auth state is stale; re-authentication may be needed"
            );
        }
        status
    }

    /// Record that authentication just succeeded.
    pub fn record_authenticated(&self) -> Result<()> {
        let info = AuthInfo {
            authenticated_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| Error::Internal(format!("failed to serialize auth info: {e}")))?;
        if let Some(parent) = self.auth_info_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.auth_info_file, json)?;
        Ok(())
    }

    /// Remove stored authentication state and metadata.
    pub fn clear(&self) -> Result<()> {
        for path in [&self.state_file, &self.auth_info_file] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
