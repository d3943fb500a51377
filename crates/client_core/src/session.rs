//! Durable cache of the signed-in user.
//!
//! The cache only pre-populates the session optimistically at startup; the
//! server session stays authoritative.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::UserProfile;
use storage::Storage;
use tracing::warn;

use crate::error::ClientError;

pub const SESSION_STORAGE_KEY: &str = "authenticated_user";

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, serialized: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Keeps nothing across restarts.
pub struct MissingSessionPersistence;

#[async_trait]
impl SessionPersistence for MissingSessionPersistence {
    async fn load(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn save(&self, _serialized: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for Storage {
    async fn load(&self) -> Result<Option<String>> {
        self.get_value(SESSION_STORAGE_KEY).await
    }

    async fn save(&self, serialized: &str) -> Result<()> {
        self.put_value(SESSION_STORAGE_KEY, serialized).await
    }

    async fn clear(&self) -> Result<()> {
        self.delete_value(SESSION_STORAGE_KEY).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SessionCache {
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionCache {
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Self {
        Self { persistence }
    }

    pub async fn store(&self, user: &UserProfile) -> Result<(), ClientError> {
        let serialized =
            serde_json::to_string(user).map_err(|err| ClientError::Storage(err.to_string()))?;
        self.persistence
            .save(&serialized)
            .await
            .map_err(|err| ClientError::Storage(format!("{err:#}")))
    }

    pub async fn erase(&self) -> Result<(), ClientError> {
        self.persistence
            .clear()
            .await
            .map_err(|err| ClientError::Storage(format!("{err:#}")))
    }

    /// Loads the cached user. An unreadable entry is erased and treated as
    /// absent.
    pub async fn restore(&self) -> Result<Option<UserProfile>, ClientError> {
        let Some(serialized) = self
            .persistence
            .load()
            .await
            .map_err(|err| ClientError::Storage(format!("{err:#}")))?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<UserProfile>(&serialized) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                warn!(error = %err, "session: discarding unreadable cached user");
                self.erase().await?;
                Ok(None)
            }
        }
    }
}
