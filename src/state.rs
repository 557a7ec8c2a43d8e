use crate::audio::PlaybackSlot;
use crate::auth::AccountService;
use crate::gateway::{ChatSession, ConversationGateway};
use crate::history::HistoryStore;
use crate::models::Account;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Who is signed in, and their conversation context with the remote service.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn {
        account: Account,
        chat: ChatSession,
    },
}

impl AuthState {
    pub fn account(&self) -> Option<&Account> {
        match self {
            AuthState::SignedOut => None,
            AuthState::SignedIn { account, .. } => Some(account),
        }
    }
}

// Core application state, the single owner of the current session
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub history: HistoryStore,
    pub gateway: ConversationGateway,
    pub playback: PlaybackSlot,
    pub auth: Arc<Mutex<AuthState>>,
}

impl AppState {
    pub fn new(
        accounts: AccountService,
        history: HistoryStore,
        gateway: ConversationGateway,
    ) -> Self {
        Self {
            accounts,
            history,
            gateway,
            playback: PlaybackSlot::new(),
            auth: Arc::new(Mutex::new(AuthState::SignedOut)),
        }
    }

    /// Builds the state and resumes a persisted session, if there is one.
    pub async fn restore(
        accounts: AccountService,
        history: HistoryStore,
        gateway: ConversationGateway,
    ) -> Self {
        let state = Self::new(accounts, history, gateway);
        if let Some(account) = state.accounts.current_user().await {
            log::info!("Resuming session for {}", account.username);
            state.enter(account).await;
        }
        state
    }

    /// Switches to signed-in with a chat session primed from stored history.
    pub(crate) async fn enter(&self, account: Account) {
        let mut chat = self
            .gateway
            .create_session(account.system_instruction.as_deref());
        chat.seed_history(&self.history.get_or_default(&account.id).await);
        *self.auth.lock().await = AuthState::SignedIn { account, chat };
    }

    pub(crate) async fn leave(&self) {
        *self.auth.lock().await = AuthState::SignedOut;
    }

    pub async fn signed_in_account(&self) -> Option<Account> {
        self.auth.lock().await.account().cloned()
    }
}
