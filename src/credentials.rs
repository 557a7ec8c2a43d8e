use crate::error::StorageError;
use crate::models::StoredAccount;
use crate::storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const USERS_KEY: &str = "chat_users";

/// Username -> account record, kept as one mapping under [`USERS_KEY`].
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Reads the full mapping. An absent key is an empty mapping.
    pub async fn get_all(&self) -> Result<HashMap<String, StoredAccount>, StorageError> {
        let Some(raw) = self.kv.get(USERS_KEY).await? else {
            return Ok(HashMap::new());
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            key: USERS_KEY.to_string(),
            source,
        })
    }

    /// Like [`get_all`](Self::get_all), but unreadable data counts as no accounts.
    pub async fn get_all_or_default(&self) -> HashMap<String, StoredAccount> {
        self.get_all().await.unwrap_or_else(|e| {
            log::warn!("Error reading accounts, treating as empty: {}", e);
            HashMap::new()
        })
    }

    pub async fn save_all(
        &self,
        accounts: &HashMap<String, StoredAccount>,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(accounts).map_err(|source| StorageError::Serialize {
            key: USERS_KEY.to_string(),
            source,
        })?;
        self.kv.set(USERS_KEY, &raw).await
    }
}
