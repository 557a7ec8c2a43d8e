use thiserror::Error;

/// Errors raised by the key-value storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The stored value under `key` could not be parsed.
    #[error("corrupt data under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by account operations. The messages are shown to the user.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username already exists.")]
    DuplicateUsername(String),

    // Same message whether the user is unknown or the password is wrong.
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("User not found to update.")]
    UserNotFound(String),

    #[error("Could not save your session. Please try again.")]
    SessionPersistence(#[source] StorageError),

    #[error("{0}")]
    InvalidInput(&'static str),
}

/// Failures talking to the remote conversational/speech API.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("API returned no usable content")]
    EmptyResponse,

    #[error("invalid audio payload: {0}")]
    Audio(#[from] base64::DecodeError),
}
