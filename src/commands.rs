// Operations exposed to the front end. Errors come back as user-facing text.

use crate::audio::Playback;
use crate::models::{Account, Message, ProfileUpdate};
use crate::state::{AppState, AuthState};
use serde::Serialize;

const NOT_SIGNED_IN: &str = "You need to sign in first.";

/// The two messages produced by one send.
#[derive(Serialize, Debug, Clone)]
pub struct ChatExchange {
    pub user: Message,
    pub reply: Message,
}

pub async fn sign_up(
    state: &AppState,
    username: String,
    password: String,
) -> Result<Account, String> {
    log::info!("Frontend requested sign-up for: {}", username);
    match state.accounts.sign_up(&username, &password).await {
        Ok(account) => {
            state.enter(account.clone()).await;
            Ok(account)
        }
        Err(e) => {
            log::warn!("Sign-up failed for {}: {:?}", username, e);
            Err(e.to_string())
        }
    }
}

pub async fn sign_in(
    state: &AppState,
    username: String,
    password: String,
) -> Result<Account, String> {
    log::info!("Frontend requested sign-in for: {}", username);
    match state.accounts.sign_in(&username, &password).await {
        Ok(account) => {
            state.enter(account.clone()).await;
            Ok(account)
        }
        Err(e) => {
            log::warn!("Sign-in failed for {}: {:?}", username, e);
            Err(e.to_string())
        }
    }
}

pub async fn sign_out(state: &AppState) {
    log::info!("Frontend requested sign-out");
    state.accounts.sign_out().await;
    state.leave().await;
}

pub async fn current_user(state: &AppState) -> Option<Account> {
    state.signed_in_account().await
}

/// Updates the signed-in user's profile. A changed system instruction starts
/// a fresh chat session with it.
pub async fn update_profile(
    state: &AppState,
    system_instruction: Option<String>,
    profile_photo: Option<String>,
) -> Result<Account, String> {
    let Some(current) = state.signed_in_account().await else {
        return Err(NOT_SIGNED_IN.to_string());
    };
    log::info!("Frontend requested profile update for: {}", current.username);

    let update = ProfileUpdate {
        username: current.username.clone(),
        system_instruction,
        profile_photo,
    };
    let updated = state.accounts.update_profile(update).await.map_err(|e| {
        log::error!("Failed to update profile for {}: {:?}", current.username, e);
        e.to_string()
    })?;

    if updated.system_instruction != current.system_instruction {
        state.enter(updated.clone()).await;
    } else if let AuthState::SignedIn { account, .. } = &mut *state.auth.lock().await {
        *account = updated.clone();
    }
    Ok(updated)
}

pub async fn get_chat_history(state: &AppState) -> Result<Vec<Message>, String> {
    let account = state
        .signed_in_account()
        .await
        .ok_or_else(|| NOT_SIGNED_IN.to_string())?;
    log::info!("Frontend requested chat history for: {}", account.id);
    Ok(state.history.get_or_default(&account.id).await)
}

/// Greeting shown in place of an empty conversation.
pub async fn greeting(state: &AppState) -> Option<String> {
    let account = state.signed_in_account().await?;
    if state.history.get_or_default(&account.id).await.is_empty() {
        Some(format!("Hello my friend {}", account.username))
    } else {
        None
    }
}

/// Appends the user's message, asks the gateway for a reply, appends and
/// saves it. The auth lock is held for the whole exchange, so sends are
/// processed one at a time.
pub async fn send_message(state: &AppState, text: String) -> Result<ChatExchange, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("Message cannot be empty.".to_string());
    }

    let mut auth = state.auth.lock().await;
    let AuthState::SignedIn { account, chat } = &mut *auth else {
        return Err(NOT_SIGNED_IN.to_string());
    };
    log::info!("Frontend requested to send message for user: {}", account.id);

    let mut messages = state.history.get_or_default(&account.id).await;
    let user_message = Message::user(text);
    messages.push(user_message.clone());
    state.history.save(&account.id, &messages).await;

    let reply_text = state.gateway.send_message(chat, text).await;
    let reply = Message::assistant(reply_text);
    messages.push(reply.clone());
    state.history.save(&account.id, &messages).await;

    Ok(ChatExchange {
        user: user_message,
        reply,
    })
}

/// Synthesizes speech for a message. Only one playback may be in flight; the
/// returned [`Playback`] holds the slot until the caller drops it.
pub async fn play_message_audio(
    state: &AppState,
    message_id: String,
    text: String,
) -> Result<Playback, String> {
    log::info!("Frontend requested audio for message: {}", message_id);
    let Some(guard) = state.playback.try_acquire(&message_id) else {
        return Err("Another message is already playing.".to_string());
    };

    match state.gateway.generate_speech(&text).await {
        Some(audio) => Ok(Playback::new(message_id, audio, guard)),
        None => Err("Could not generate audio for this message.".to_string()),
    }
}
