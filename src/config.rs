use crate::api::DEFAULT_API_URL;
use crate::auth::Latency;
use crate::gateway::GatewayOptions;
use anyhow::{Context, Result};
use keyring::Entry;
use std::path::PathBuf;
use std::time::Duration;

const KEYRING_SERVICE: &str = "pocketchat_api_key";
const KEYRING_USER: &str = "gemini";
const DEFAULT_API_KEY_REF: &str = "env:API_KEY";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Where the API key lives: `env:<VAR>` or `keyring`.
    pub api_key_ref: String,
    pub api_url: String,
    pub gateway: GatewayOptions,
    pub latency: Latency,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            api_key_ref: DEFAULT_API_KEY_REF.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            gateway: GatewayOptions::default(),
            latency: Latency::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pocketchat")
        .join("pocketchat.sqlite")
}

fn env_millis(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(value) => {
            let millis: u64 = value.trim().parse().with_context(|| {
                format!("{} must be a number of milliseconds, got '{}'", name, value)
            })?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Defaults overridden by `POCKETCHAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("POCKETCHAT_DB") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(key_ref) = std::env::var("POCKETCHAT_API_KEY_REF") {
            config.api_key_ref = key_ref;
        }
        if let Ok(url) = std::env::var("POCKETCHAT_API_URL") {
            config.api_url = url;
        }
        if let Ok(model) = std::env::var("POCKETCHAT_CHAT_MODEL") {
            config.gateway.chat_model = model;
        }
        if let Ok(model) = std::env::var("POCKETCHAT_SPEECH_MODEL") {
            config.gateway.speech_model = model;
        }
        if let Ok(voice) = std::env::var("POCKETCHAT_VOICE") {
            config.gateway.voice = voice;
        }
        if let Some(delay) = env_millis("POCKETCHAT_AUTH_LATENCY_MS")? {
            config.latency.auth = delay;
        }
        if let Some(delay) = env_millis("POCKETCHAT_PROFILE_LATENCY_MS")? {
            config.latency.profile = delay;
        }
        Ok(config)
    }
}

// --- API Key Retrieval ---

/// Resolves the API key named by `api_key_ref`. A missing key is an error;
/// the application cannot start without one.
pub fn get_api_key(config: &AppConfig) -> Result<String> {
    let key = match config.api_key_ref.as_str() {
        ref_str if ref_str.starts_with("env:") => {
            let env_var_name = ref_str.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            std::env::var(env_var_name).context(format!(
                "{} environment variable is not set",
                env_var_name
            ))?
        }
        "keyring" => {
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            read_api_key(&keyring_entry()?)?
        }
        other => return Err(anyhow::anyhow!("Unsupported api_key_ref format: {}", other)),
    };

    if key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key from '{}' is empty", config.api_key_ref));
    }
    Ok(key)
}

fn keyring_entry() -> Result<Entry> {
    Entry::new(KEYRING_SERVICE, KEYRING_USER).context("Failed to create keyring entry")
}

fn read_api_key(entry: &Entry) -> Result<String> {
    entry
        .get_password()
        .context("Failed to get API key from keyring. Please store one first.")
}

fn store_api_key(entry: &Entry, api_key: &str) -> Result<()> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(anyhow::anyhow!("Refusing to store an empty API key"));
    }
    entry
        .set_password(api_key)
        .context("Failed to set API key in keyring")
}

/// Stores an API key in the OS keyring, for use with `api_key_ref = "keyring"`.
pub fn set_api_key_in_keyring(api_key: &str) -> Result<()> {
    log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
    store_api_key(&keyring_entry()?, api_key)
}
