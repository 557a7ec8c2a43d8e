use crate::error::StorageError;
use crate::models::Account;
use crate::storage::KeyValueStore;
use std::sync::Arc;

pub const CURRENT_USER_KEY: &str = "chat_current_user";

/// The single current-session slot.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Reads the signed-in user. A corrupt slot is cleared before the error
    /// is returned, so the next read sees no session.
    pub async fn get(&self) -> Result<Option<Account>, StorageError> {
        let Some(raw) = self.kv.get(CURRENT_USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(account) => Ok(Some(account)),
            Err(source) => {
                log::warn!("Corrupt session record, clearing it: {}", source);
                self.clear().await;
                Err(StorageError::Corrupt {
                    key: CURRENT_USER_KEY.to_string(),
                    source,
                })
            }
        }
    }

    pub async fn set(&self, account: &Account) -> Result<(), StorageError> {
        let raw = serde_json::to_string(account).map_err(|source| StorageError::Serialize {
            key: CURRENT_USER_KEY.to_string(),
            source,
        })?;
        self.kv.set(CURRENT_USER_KEY, &raw).await
    }

    pub async fn clear(&self) {
        if let Err(e) = self.kv.remove(CURRENT_USER_KEY).await {
            log::error!("Failed to clear session record: {}", e);
        }
    }
}
