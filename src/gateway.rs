//! Conversation gateway: adapts local messages to the remote chat and speech
//! API. Failures never escape; chat falls back to a canned reply and speech
//! to `None`.

use crate::api::{ChatRequest, ChatTurn, LlmApiProvider, SpeechRequest};
use crate::audio::SpeechAudio;
use crate::models::{Message, Role};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful and friendly chatbot. Keep your responses concise and engaging.";
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub chat_model: String,
    pub speech_model: String,
    pub voice: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            chat_model: "gemini-2.5-flash".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Kore".to_string(),
        }
    }
}

/// Conversation context for one user. Reuse it for every turn so the remote
/// service sees the earlier exchange.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    system_instruction: String,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Primes the context with a previously stored conversation.
    pub fn seed_history(&mut self, messages: &[Message]) {
        self.turns.extend(messages.iter().map(|msg| ChatTurn {
            role: msg.role,
            text: msg.text.clone(),
        }));
    }
}

#[derive(Clone)]
pub struct ConversationGateway {
    provider: Arc<dyn LlmApiProvider>,
    options: GatewayOptions,
}

impl ConversationGateway {
    pub fn new(provider: Arc<dyn LlmApiProvider>, options: GatewayOptions) -> Self {
        Self { provider, options }
    }

    pub fn create_session(&self, system_instruction: Option<&str>) -> ChatSession {
        let system_instruction = system_instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
            .to_string();
        let session = ChatSession {
            id: Uuid::new_v4(),
            system_instruction,
            turns: Vec::new(),
        };
        log::debug!("Created chat session {}", session.id);
        session
    }

    /// Sends one turn. The session only records the exchange when it succeeds.
    pub async fn send_message(&self, session: &mut ChatSession, text: &str) -> String {
        let request = ChatRequest {
            model: self.options.chat_model.clone(),
            system_instruction: session.system_instruction.clone(),
            history: session.turns.clone(),
            message: text.to_string(),
        };

        match self.provider.generate_reply(&request).await {
            Ok(reply) => {
                session.turns.push(ChatTurn {
                    role: Role::User,
                    text: text.to_string(),
                });
                session.turns.push(ChatTurn {
                    role: Role::Assistant,
                    text: reply.clone(),
                });
                reply
            }
            Err(e) => {
                log::error!("Error sending message to bot (session {}): {}", session.id, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    pub async fn generate_speech(&self, text: &str) -> Option<SpeechAudio> {
        let request = SpeechRequest {
            model: self.options.speech_model.clone(),
            text: text.to_string(),
            voice: self.options.voice.clone(),
        };

        let encoded = match self.provider.synthesize_speech(&request).await {
            Ok(Some(encoded)) => encoded,
            Ok(None) => {
                log::warn!("Speech response carried no audio");
                return None;
            }
            Err(e) => {
                log::error!("Error generating speech: {}", e);
                return None;
            }
        };

        SpeechAudio::from_base64(&encoded)
            .map_err(|e| log::error!("Error decoding speech audio: {}", e))
            .ok()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;
    use crate::error::GatewayError;

    fn gateway(provider: ScriptedProvider) -> (ConversationGateway, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (
            ConversationGateway::new(provider.clone(), GatewayOptions::default()),
            provider,
        )
    }

    #[test]
    fn blank_instruction_falls_back_to_default() {
        let (gateway, _) = gateway(ScriptedProvider::default());
        assert_eq!(
            gateway.create_session(None).system_instruction(),
            DEFAULT_SYSTEM_INSTRUCTION
        );
        assert_eq!(
            gateway.create_session(Some("  ")).system_instruction(),
            DEFAULT_SYSTEM_INSTRUCTION
        );
        assert_eq!(
            gateway.create_session(Some("Be terse.")).system_instruction(),
            "Be terse."
        );
    }

    #[tokio::test]
    async fn session_carries_context_between_turns() {
        let (gateway, provider) = gateway(
            ScriptedProvider::default()
                .reply(Ok("Hello!".into()))
                .reply(Ok("You said hi.".into())),
        );
        let mut session = gateway.create_session(Some("Be terse."));

        assert_eq!(gateway.send_message(&mut session, "hi").await, "Hello!");
        assert_eq!(
            gateway.send_message(&mut session, "what did I say?").await,
            "You said hi."
        );

        let requests = provider.chat_requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[1].text, "Hello!");
        assert_eq!(requests[1].system_instruction, "Be terse.");
        assert_eq!(requests[1].model, "gemini-2.5-flash");
        assert_eq!(session.turns().len(), 4);
    }

    #[tokio::test]
    async fn failure_returns_fallback_and_keeps_context() {
        let (gateway, _) = gateway(ScriptedProvider::default().reply(Err(GatewayError::Status {
            status: 500,
            message: "boom".into(),
        })));
        let mut session = gateway.create_session(None);

        assert_eq!(gateway.send_message(&mut session, "hi").await, FALLBACK_REPLY);
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn seeded_history_is_replayed() {
        let (gateway, provider) = gateway(ScriptedProvider::default().reply(Ok("ok".into())));
        let mut session = gateway.create_session(None);
        session.seed_history(&[Message::user("earlier"), Message::assistant("reply")]);

        gateway.send_message(&mut session, "next").await;
        let requests = provider.chat_requests.lock().unwrap();
        assert_eq!(requests[0].history[0].text, "earlier");
        assert_eq!(requests[0].history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn speech_distinguishes_absent_from_empty() {
        let (gateway, _) = gateway(
            ScriptedProvider::default()
                .speech(Ok(Some("AAA=".into())))
                .speech(Ok(Some(String::new())))
                .speech(Ok(None))
                .speech(Err(GatewayError::EmptyResponse))
                .speech(Ok(Some("%%%".into()))),
        );

        assert_eq!(gateway.generate_speech("a").await.unwrap().pcm, vec![0, 0]);
        let empty = gateway.generate_speech("b").await;
        assert!(empty.is_some_and(|audio| audio.is_empty()));
        assert!(gateway.generate_speech("c").await.is_none());
        assert!(gateway.generate_speech("d").await.is_none());
        assert!(gateway.generate_speech("e").await.is_none());
    }
}
