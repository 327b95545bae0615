//! Groq provider (OpenAI-compatible Chat Completions)
//!
//! Text-only Llama/Gemma/Mixtral models. Images and uploaded file
//! references are refused when they are attached.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::streaming::{FrameAction, ensure_success, pump_sse};
use super::{ChatProvider, ChatRequest, NormalizedMessage, Part, ProviderAdapter, StreamEvent, Usage};
use crate::chat::content::Role;
use crate::core::SseFrame;
use crate::error::{ChatError, ChatResult};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const STREAM_TIMEOUT_SECS: u64 = 120;
const PROVIDER: &str = "groq";

pub struct GroqProvider {
    client: HttpClient,
    api_key: String,
    api_url: String,
}

impl GroqProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            api_url: GROQ_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// System message first, then history
    fn build_messages(request: &ChatRequest) -> ChatResult<Vec<ChatMessage>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if !request.system_instruction.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: request.system_instruction.clone(),
            });
        }

        for message in &request.messages {
            messages.push(Self::build_message(message)?);
        }

        Ok(messages)
    }

    /// Text parts joined by newlines; anything else cannot be carried
    fn build_message(message: &NormalizedMessage) -> ChatResult<ChatMessage> {
        let mut texts = Vec::with_capacity(message.parts.len());
        for part in &message.parts {
            match part {
                Part::Text(text) => texts.push(text.as_str()),
                Part::InlineImage { mime, .. } => return Err(Self::part_rejected("inline images", mime)),
                Part::File(file) => return Err(Self::part_rejected("uploaded files", &file.mime_type)),
            }
        }

        Ok(ChatMessage {
            role: message.role,
            content: texts.join("\n"),
        })
    }

    fn part_rejected(what: &str, mime: &str) -> ChatError {
        ChatError::Stream(format!("groq cannot carry {} ({})", what, mime))
    }

    fn parse_frame(frame: &SseFrame) -> ChatResult<FrameAction> {
        if frame.is_done() {
            return Ok(FrameAction::Finish);
        }

        let chunk: ChatChunk = frame.parse()?;
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(StreamEvent::Error(format!("Groq error: {}", error.message)));
            return Ok(FrameAction::Emit(events));
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta(text));
            }
        }

        if let Some(usage) = chunk.usage.or(chunk.x_groq.and_then(|x| x.usage)) {
            events.push(StreamEvent::Usage(Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            }));
        }

        Ok(FrameAction::Emit(events))
    }
}

impl ProviderAdapter for GroqProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn role_label(&self, role: Role) -> &'static str {
        role.as_str()
    }

    fn accepts_inline_images(&self) -> bool {
        false
    }

    fn accepts_remote_files(&self) -> bool {
        false
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    async fn create_stream(&self, request: ChatRequest) -> ChatResult<mpsc::Receiver<StreamEvent>> {
        let api_request = ChatCompletionRequest {
            model: request.params.model().to_string(),
            messages: Self::build_messages(&request)?,
            temperature: request.params.temperature(),
            max_tokens: request.params.max_tokens(),
            stream: true,
        };

        debug!(
            "Groq stream: model={}, {} messages",
            api_request.model,
            api_request.messages.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .send()
            .await?;
        let response = ensure_success(PROVIDER, response).await?;

        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(pump_sse(response, tx, Self::parse_frame));
        Ok(rx)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
    x_groq: Option<GroqExtension>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct GroqExtension {
    usage: Option<ChunkUsage>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}
