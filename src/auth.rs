//! Account service: sign-up, sign-in, sign-out and profile updates over the
//! credential and session stores.
//!
//! Writes to the credential store are best-effort. A failed session write
//! fails the operation even if the credential store was already updated;
//! there is no rollback.

use crate::credentials::CredentialStore;
use crate::error::AccountError;
use crate::models::{Account, ProfileUpdate, StoredAccount};
use crate::session::SessionStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;

const SURROGATE_PREFIX: &str = "pocketchat:v1:";

/// Deterministic stand-in for a password, used only for equality checks.
/// Not salted and not a substitute for a real password hash.
pub fn derive_surrogate(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SURROGATE_PREFIX.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn surrogate_matches(stored: &str, password: &str) -> bool {
    let derived = derive_surrogate(password);
    stored.as_bytes().ct_eq(derived.as_bytes()).into()
}

/// Simulated round-trip delay before each mutating call.
#[derive(Debug, Clone, Copy)]
pub struct Latency {
    pub auth: Duration,
    pub profile: Duration,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            auth: Duration::from_millis(500),
            profile: Duration::from_millis(300),
        }
    }
}

impl Latency {
    pub fn none() -> Self {
        Self {
            auth: Duration::ZERO,
            profile: Duration::ZERO,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Clone)]
pub struct AccountService {
    credentials: CredentialStore,
    session: SessionStore,
    latency: Latency,
}

impl AccountService {
    pub fn new(credentials: CredentialStore, session: SessionStore, latency: Latency) -> Self {
        Self {
            credentials,
            session,
            latency,
        }
    }

    async fn persist_accounts(&self, accounts: &HashMap<String, StoredAccount>) {
        if let Err(e) = self.credentials.save_all(accounts).await {
            log::error!("Error saving accounts: {}", e);
        }
    }

    async fn remember(&self, account: &Account) -> Result<(), AccountError> {
        self.session.set(account).await.map_err(|e| {
            log::error!("Error saving session for {}: {}", account.username, e);
            AccountError::SessionPersistence(e)
        })
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<Account, AccountError> {
        pause(self.latency.auth).await;
        if username.is_empty() {
            return Err(AccountError::InvalidInput("Username cannot be empty."));
        }
        if password.is_empty() {
            return Err(AccountError::InvalidInput("Password cannot be empty."));
        }

        let mut accounts = self.credentials.get_all_or_default().await;
        if accounts.contains_key(username) {
            log::info!("Sign-up rejected, username taken: {}", username);
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }

        let stored = StoredAccount::new(username, derive_surrogate(password));
        let account = stored.strip();
        accounts.insert(username.to_string(), stored);
        self.persist_accounts(&accounts).await;
        log::info!("Created account {} ({})", account.username, account.id);

        self.remember(&account).await?;
        Ok(account)
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Account, AccountError> {
        pause(self.latency.auth).await;
        let accounts = self.credentials.get_all_or_default().await;
        let stored = accounts
            .get(username)
            .filter(|stored| surrogate_matches(&stored.password_surrogate, password))
            .ok_or(AccountError::InvalidCredentials)?;

        let account = stored.strip();
        self.remember(&account).await?;
        log::info!("Signed in {}", account.username);
        Ok(account)
    }

    pub async fn sign_out(&self) {
        self.session.clear().await;
        log::info!("Signed out");
    }

    /// The persisted session, not re-checked against the credential store.
    pub async fn current_user(&self) -> Option<Account> {
        self.session.get().await.unwrap_or_else(|e| {
            log::warn!("Error retrieving current user: {}", e);
            None
        })
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Account, AccountError> {
        pause(self.latency.profile).await;
        let mut accounts = self.credentials.get_all_or_default().await;
        let Some(stored) = accounts.get_mut(&update.username) else {
            return Err(AccountError::UserNotFound(update.username));
        };

        stored.apply(update);
        let account = stored.strip();
        self.persist_accounts(&accounts).await;
        log::info!("Updated profile for {}", account.username);

        self.remember(&account).await?;
        Ok(account)
    }
}
