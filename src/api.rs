use crate::error::GatewayError;
use crate::models::Role;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One earlier turn of a conversation, replayed so the service keeps context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub model: String,
    pub text: String,
    pub voice: String,
}

// Trait defining the interface for the remote conversational/speech API
#[async_trait]
pub trait LlmApiProvider: Send + Sync {
    /// Sends one user turn and returns the reply text.
    async fn generate_reply(&self, request: &ChatRequest) -> Result<String, GatewayError>;

    /// Returns the base64 audio payload, or `None` when the response carried none.
    async fn synthesize_speech(
        &self,
        request: &SpeechRequest,
    ) -> Result<Option<String>, GatewayError>;
}

// --- Gemini REST Provider Implementation ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn chat_body(request: &ChatRequest) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| Content::text(Some(api_role(turn.role)), turn.text.clone()))
        .collect();
    contents.push(Content::text(Some("user"), request.message.clone()));

    GenerateContentRequest {
        contents,
        system_instruction: Some(Content::text(None, request.system_instruction.clone())),
        generation_config: None,
    }
}

fn speech_body(request: &SpeechRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text(None, format!("Say: {}", request.text))],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: request.voice.clone(),
                    },
                },
            },
        }),
    }
}

fn first_parts(response: GenerateContentResponse) -> Vec<Part> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default()
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GatewayError> {
    let text: String = first_parts(response)
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn extract_audio(response: GenerateContentResponse) -> Option<String> {
    first_parts(response)
        .into_iter()
        .find_map(|part| part.inline_data)
        .map(|inline| inline.data)
}

fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorWrapper>(&body) {
        Ok(wrapper) => {
            let message = wrapper.error.message.unwrap_or_else(|| body.clone());
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{}: {}", status, message),
                _ => message,
            }
        }
        Err(_) => body,
    }
}

pub struct GeminiProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GatewayError> {
        let request_url = format!(
            "{}/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            model
        );
        log::info!("Sending request to Gemini API using model: {}", model);

        let response = self
            .client
            .post(&request_url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<Failed to read error body>".to_string());
            log::error!("Gemini API request failed with status {}: {}", status, error_body);
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(error_body),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmApiProvider for GeminiProvider {
    async fn generate_reply(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let response = self.generate_content(&request.model, &chat_body(request)).await?;
        extract_text(response)
    }

    async fn synthesize_speech(
        &self,
        request: &SpeechRequest,
    ) -> Result<Option<String>, GatewayError> {
        let response = self.generate_content(&request.model, &speech_body(request)).await?;
        Ok(extract_audio(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn chat_request() -> ChatRequest {
        ChatRequest {
            model: "gemini-2.5-flash".into(),
            system_instruction: "Be brief.".into(),
            history: vec![
                ChatTurn {
                    role: Role::User,
                    text: "hi".into(),
                },
                ChatTurn {
                    role: Role::Assistant,
                    text: "hello".into(),
                },
            ],
            message: "how are you?".into(),
        }
    }

    #[test]
    fn chat_body_replays_history_with_api_roles() {
        let body = serde_json::to_value(chat_body(&chat_request())).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "how are you?"}]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}]}
            })
        );
    }

    #[test]
    fn speech_body_asks_for_audio() {
        let body = serde_json::to_value(speech_body(&SpeechRequest {
            model: "tts".into(),
            text: "hello".into(),
            voice: "Kore".into(),
        }))
        .unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Say: hello");
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        let voice = &body["generationConfig"]["speechConfig"]["voiceConfig"];
        assert_eq!(voice["prebuiltVoiceConfig"]["voiceName"], "Kore");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn extracts_text_and_audio() {
        let text: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Hi "}, {"text": "there"}]
                }
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(text).unwrap(), "Hi there");

        let audio: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": {"mimeType": "audio/L16;rate=24000", "data": "AAE="}
                    }]
                }
            }]
        }))
        .unwrap();
        assert_eq!(extract_audio(audio).as_deref(), Some("AAE="));

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(extract_text(empty), Err(GatewayError::EmptyResponse)));
    }

    #[test]
    fn error_message_prefers_api_status() {
        let body = json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        })
        .to_string();
        assert_eq!(error_message(body), "INVALID_ARGUMENT: API key not valid");
        assert_eq!(error_message("plain".into()), "plain");
    }

    // Serves a single canned HTTP response and returns the raw request it saw.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn provider_posts_to_model_endpoint() {
        let reply = json!({"candidates": [{"content": {"parts": [{"text": "fine, thanks"}]}}]});
        let (url, server) = serve_once("200 OK", reply.to_string()).await;
        let provider = GeminiProvider::new(url, "secret-key");

        let text = provider.generate_reply(&chat_request()).await.unwrap();
        assert_eq!(text, "fine, thanks");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /gemini-2.5-flash:generateContent?key=secret-key"));
        assert!(raw.contains("how are you?"));
    }

    #[tokio::test]
    async fn provider_reports_error_status() {
        let body = json!({"error": {"message": "quota", "status": "RESOURCE_EXHAUSTED"}});
        let (url, _server) = serve_once("429 Too Many Requests", body.to_string()).await;
        let provider = GeminiProvider::new(url, "k");

        match provider.generate_reply(&chat_request()).await {
            Err(GatewayError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "RESOURCE_EXHAUSTED: quota");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
