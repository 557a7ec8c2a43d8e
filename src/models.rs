use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// System instruction given to every newly created account.
pub const DEFAULT_ACCOUNT_INSTRUCTION: &str = "You are a helpful and friendly chatbot.";

// A signed-in user as seen by the rest of the application (no secret).
// The same shape is persisted as the current-session record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    // Inline image data (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

// Account record as kept by the credential store, secret included
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    #[serde(flatten)]
    pub account: Account,
    pub password_surrogate: String,
}

impl StoredAccount {
    /// Creates a fresh record with a new id and the default instruction.
    pub fn new(username: impl Into<String>, password_surrogate: String) -> Self {
        Self {
            account: Account {
                id: Uuid::new_v4().to_string(),
                username: username.into(),
                system_instruction: Some(DEFAULT_ACCOUNT_INSTRUCTION.to_string()),
                profile_photo: None,
            },
            password_surrogate,
        }
    }

    /// Drops the secret, leaving the session-safe record.
    pub fn strip(&self) -> Account {
        self.account.clone()
    }

    /// Merges a profile update. Neither the id nor the username changes.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(instruction) = update.system_instruction {
            self.account.system_instruction = Some(instruction);
        }
        if let Some(photo) = update.profile_photo {
            self.account.profile_photo = Some(photo);
        }
    }
}

/// Partial profile change; `None` fields keep their stored value.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: String,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model")]
    Assistant,
}

// Represents a single message in a conversation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl Message {
    // v7 ids sort in creation order within a process
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}
