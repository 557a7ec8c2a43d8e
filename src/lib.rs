//! Local-first chat client core.
//!
//! Accounts, the current session and per-user chat history live in a local
//! key-value store; replies and speech come from the Gemini API.

pub mod api;
pub mod audio;
pub mod auth;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod history;
pub mod models;
pub mod session;
pub mod state;
pub mod storage;

use crate::api::{GeminiProvider, LlmApiProvider};
use crate::auth::AccountService;
use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::gateway::ConversationGateway;
use crate::history::HistoryStore;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::storage::{KeyValueStore, SqliteStore};
use anyhow::Context;
use std::sync::Arc;

/// Installs `env_logger` with an `info` default; `RUST_LOG` overrides it.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Wires storage, services and the Gemini provider, then resumes any
/// persisted session. Fails if no API key is available.
pub async fn bootstrap(app_config: &AppConfig) -> anyhow::Result<AppState> {
    let api_key = config::get_api_key(app_config).context("API key is required to start")?;

    let kv: Arc<dyn KeyValueStore> = Arc::new(
        SqliteStore::open(&app_config.database_path)
            .await
            .context("Failed to open local storage")?,
    );

    // Create the API provider instance
    let api_provider: Arc<dyn LlmApiProvider> =
        Arc::new(GeminiProvider::new(app_config.api_url.clone(), api_key));

    let accounts = AccountService::new(
        CredentialStore::new(kv.clone()),
        SessionStore::new(kv.clone()),
        app_config.latency,
    );
    let gateway = ConversationGateway::new(api_provider, app_config.gateway.clone());

    let state = AppState::restore(accounts, HistoryStore::new(kv), gateway).await;
    log::info!("Application state ready");
    Ok(state)
}

/// Entry point for a front end: logging, `POCKETCHAT_*` configuration, then
/// [`bootstrap`].
pub async fn start() -> anyhow::Result<AppState> {
    init_logging();
    let app_config = AppConfig::from_env().context("Invalid POCKETCHAT_* configuration")?;
    log::info!("Using database at {}", app_config.database_path.display());
    bootstrap(&app_config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_without_api_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("chat.sqlite"),
            api_key_ref: "env:POCKETCHAT_BOOTSTRAP_KEY_UNSET".into(),
            ..AppConfig::default()
        };
        assert!(bootstrap(&config).await.is_err());
    }

    #[tokio::test]
    async fn bootstrap_resumes_persisted_session() {
        init_logging();
        std::env::set_var("POCKETCHAT_BOOTSTRAP_KEY", "test-key");
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("chat.sqlite"),
            api_key_ref: "env:POCKETCHAT_BOOTSTRAP_KEY".into(),
            latency: auth::Latency::none(),
            ..AppConfig::default()
        };

        let state = bootstrap(&config).await.unwrap();
        assert_eq!(commands::current_user(&state).await, None);
        let alice = commands::sign_up(&state, "alice".into(), "pw1".into())
            .await
            .unwrap();

        let resumed = bootstrap(&config).await.unwrap();
        assert_eq!(commands::current_user(&resumed).await, Some(alice));
    }
}
