use crate::error::StorageError;
use crate::models::Message;
use crate::storage::KeyValueStore;
use std::sync::Arc;

fn history_key(user_id: &str) -> String {
    format!("chat_history_{}", user_id)
}

/// Per-user ordered message log. Always read and rewritten whole.
#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, user_id: &str) -> Result<Vec<Message>, StorageError> {
        let key = history_key(user_id);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt { key, source })
    }

    /// History for `user_id`, or an empty one if it cannot be read.
    pub async fn get_or_default(&self, user_id: &str) -> Vec<Message> {
        match self.get(user_id).await {
            Ok(messages) => {
                log::debug!("Loaded {} messages for user {}", messages.len(), user_id);
                messages
            }
            Err(e) => {
                log::warn!("Failed to retrieve chat history for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    /// Replaces the stored history. Best-effort: failures are only logged.
    pub async fn save(&self, user_id: &str, messages: &[Message]) {
        if user_id.is_empty() {
            return;
        }
        let key = history_key(user_id);
        let result = match serde_json::to_string(messages) {
            Ok(raw) => self.kv.set(&key, &raw).await,
            Err(source) => Err(StorageError::Serialize { key, source }),
        };
        if let Err(e) = result {
            log::error!("Failed to save chat history for {}: {}", user_id, e);
        }
    }
}
