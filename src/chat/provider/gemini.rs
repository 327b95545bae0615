//! Gemini provider (streamGenerateContent over SSE)
//!
//! Accepts text, inline images and references to files uploaded through
//! [`super::GeminiFileClient`]. Safety filters are relaxed to `BLOCK_NONE`
//! on all four harm categories; a prompt that is still blocked surfaces as
//! [`StreamEvent::Blocked`].

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::streaming::{FrameAction, ensure_success, pump_sse};
use super::{ChatProvider, ChatRequest, NormalizedMessage, Part, ProviderAdapter, StreamEvent, Usage};
use crate::chat::content::Role;
use crate::core::SseFrame;
use crate::error::ChatResult;

pub(super) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const STREAM_TIMEOUT_SECS: u64 = 300;
const PROVIDER: &str = "gemini";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiProvider {
    client: HttpClient,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Point at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        let system_instruction = (!request.system_instruction.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: request.system_instruction.clone(),
            }],
        });

        GeminiRequest {
            contents: request.messages.iter().map(Self::build_content).collect(),
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: request.params.temperature(),
                max_output_tokens: request.params.max_tokens(),
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| GeminiSafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }

    fn build_content(message: &NormalizedMessage) -> GeminiContent {
        let parts = message
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart::Text { text: text.clone() },
                Part::InlineImage { mime, data } => GeminiPart::InlineData {
                    inline_data: GeminiBlob {
                        mime_type: mime.clone(),
                        data: BASE64.encode(data),
                    },
                },
                Part::File(file) => GeminiPart::FileData {
                    file_data: GeminiFileData {
                        mime_type: file.mime_type.clone(),
                        file_uri: file.uri.clone(),
                    },
                },
            })
            .collect();

        GeminiContent {
            role: Some(message.role.to_string()),
            parts,
        }
    }

    /// Events carried by one SSE frame
    fn parse_frame(frame: &SseFrame) -> ChatResult<FrameAction> {
        let response: GeminiResponse = frame.parse()?;
        let mut events = Vec::new();

        if let Some(error) = response.error {
            events.push(StreamEvent::Error(format!("Gemini error: {}", error.message)));
            return Ok(FrameAction::Emit(events));
        }

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            events.push(StreamEvent::Blocked(reason));
            return Ok(FrameAction::Emit(events));
        }

        for candidate in response.candidates.unwrap_or_default() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                        events.push(StreamEvent::TextDelta(text));
                    }
                }
            }
            if candidate.finish_reason.as_deref() == Some("SAFETY") {
                events.push(StreamEvent::Blocked("SAFETY".to_string()));
                return Ok(FrameAction::Emit(events));
            }
        }

        if let Some(usage) = response.usage_metadata {
            events.push(StreamEvent::Usage(Usage {
                input_tokens: usage.prompt_token_count.unwrap_or(0),
                output_tokens: usage.candidates_token_count.unwrap_or(0),
            }));
        }

        Ok(FrameAction::Emit(events))
    }
}

impl ProviderAdapter for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn role_label(&self, role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn accepts_inline_images(&self) -> bool {
        true
    }

    fn accepts_remote_files(&self) -> bool {
        true
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn create_stream(&self, request: ChatRequest) -> ChatResult<mpsc::Receiver<StreamEvent>> {
        let api_request = Self::build_request(&request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url,
            request.params.model(),
            self.api_key
        );

        debug!(
            "Gemini stream: model={}, {} messages",
            request.params.model(),
            api_request.contents.len()
        );

        let response = self
            .client
            .post(&url)
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
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    safety_settings: Vec<GeminiSafetySetting>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: GeminiFileData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::provider::{FileState, ModelParameters, RemoteFile};
    use crate::core::SseDecoder;
    use bytes::Bytes;

    fn request(messages: Vec<NormalizedMessage>) -> ChatRequest {
        ChatRequest {
            params: ModelParameters::new("gemini-1.5-flash", 0.7, 500).unwrap(),
            system_instruction: "Be helpful.".into(),
            messages,
        }
    }

    fn frame(data: &str) -> SseFrame {
        let mut decoder = SseDecoder::new();
        decoder.push_str(&format!("data: {}\n", data)).remove(0)
    }

    fn emitted(action: FrameAction) -> Vec<StreamEvent> {
        match action {
            FrameAction::Emit(events) => events,
            FrameAction::Finish => panic!("unexpected finish"),
        }
    }

    #[test]
    fn test_request_wire_format() {
        let file = RemoteFile {
            name: "files/abc".into(),
            display_name: Some("video_1.mp4".into()),
            mime_type: "video/mp4".into(),
            uri: "https://example.test/files/abc".into(),
            state: FileState::Active,
            error: None,
        };
        let req = request(vec![NormalizedMessage {
            role: "user",
            parts: vec![
                Part::Text("describe".into()),
                Part::InlineImage {
                    mime: "image/png".into(),
                    data: Bytes::from_static(b"\x01\x02"),
                },
                Part::File(file),
            ],
        }]);

        let json = serde_json::to_value(GeminiProvider::build_request(&req)).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQI=");
        assert_eq!(parts[2]["fileData"]["fileUri"], "https://example.test/files/abc");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be helpful.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn test_model_role_label() {
        let provider = GeminiProvider::new("AIza-test".into());
        assert_eq!(provider.role_label(Role::Assistant), "model");
        assert_eq!(provider.role_label(Role::User), "user");
    }

    #[test]
    fn test_parse_text_and_usage() {
        let events = emitted(
            GeminiProvider::parse_frame(&frame(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}]}}],"usageMetadata":{"promptTokenCount":12,"candidatesTokenCount":3}}"#,
            ))
            .unwrap(),
        );

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hel".into()),
                StreamEvent::TextDelta("lo".into()),
                StreamEvent::Usage(Usage {
                    input_tokens: 12,
                    output_tokens: 3,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let events = emitted(
            GeminiProvider::parse_frame(&frame(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)).unwrap(),
        );
        assert_eq!(events, vec![StreamEvent::Blocked("SAFETY".into())]);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(GeminiProvider::parse_frame(&frame("{not json")).is_err());
    }
}
