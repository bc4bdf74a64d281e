use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::IdentityProvider;
use crate::remote::ApiError;
use crate::utils::fs::{remove_file_if_exists, write_atomic};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Session lifetime in hours before the online identity must be renewed.
const SESSION_EXPIRY_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub owner_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(owner_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            access_token,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + Duration::hours(SESSION_EXPIRY_HOURS)
    }
}

/// Identity backed by a session file. The online owner requires an
/// unexpired session; the offline owner is whatever was last persisted.
pub struct SessionIdentity {
    path: PathBuf,
    data: RwLock<Option<SessionData>>,
}

impl SessionIdentity {
    /// Open the session stored in `dir`, if any.
    pub fn new(dir: PathBuf) -> Self {
        let path = dir.join(SESSION_FILE);
        let data = match Self::read(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        };
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    fn read(path: &Path) -> Result<Option<SessionData>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let data = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    /// Replace the session and persist it.
    pub fn update(&self, data: SessionData) -> Result<()> {
        let contents = serde_json::to_string_pretty(&data)?;
        write_atomic(&self.path, contents.as_bytes()).context("Failed to save session file")?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    /// Clear session data, including the persisted offline owner.
    pub fn clear(&self) -> Result<()> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = None;
        remove_file_if_exists(&self.path).context("Failed to remove session file")?;
        Ok(())
    }

    pub fn data(&self) -> Option<SessionData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Access token if the session is valid
    pub fn token(&self) -> Option<String> {
        self.data()
            .filter(|d| !d.is_expired())
            .and_then(|d| d.access_token)
    }

    pub fn is_valid(&self) -> bool {
        self.data().map(|d| !d.is_expired()).unwrap_or(false)
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    async fn current_owner(&self) -> Result<Option<String>, ApiError> {
        Ok(self.data().filter(|d| !d.is_expired()).map(|d| d.owner_id))
    }

    fn offline_owner(&self) -> Option<String> {
        self.data().map(|d| d.owner_id)
    }
}
