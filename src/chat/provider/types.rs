//! Provider-neutral request, message and streaming types

use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::error::{ChatError, ChatResult};

/// Sampling parameters for one completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ModelParameters {
    pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
    pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 100..=2000;
    pub const DEFAULT_TEMPERATURE: f32 = 0.5;
    pub const DEFAULT_MAX_TOKENS: u32 = 400;

    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> ChatResult<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ChatError::InvalidParameters("model name is empty".into()));
        }
        if !Self::TEMPERATURE_RANGE.contains(&temperature) {
            return Err(ChatError::InvalidParameters(format!(
                "temperature {} outside [0, 2]",
                temperature
            )));
        }
        if !Self::MAX_TOKENS_RANGE.contains(&max_tokens) {
            return Err(ChatError::InvalidParameters(format!(
                "max_tokens {} outside [100, 2000]",
                max_tokens
            )));
        }
        Ok(Self {
            model,
            temperature,
            max_tokens,
        })
    }

    pub fn with_defaults(model: impl Into<String>) -> ChatResult<Self> {
        Self::new(model, Self::DEFAULT_TEMPERATURE, Self::DEFAULT_MAX_TOKENS)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Remote file processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unspecified,
    Processing,
    Active,
    Failed,
}

impl FileState {
    pub fn parse(s: &str) -> Self {
        match s {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" | "READY" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Unspecified,
        }
    }
}

/// A file the provider has ingested (or is ingesting)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    pub display_name: Option<String>,
    pub mime_type: String,
    pub uri: String,
    pub state: FileState,
    /// Failure reason reported by the provider
    pub error: Option<String>,
}

/// One message part in provider-neutral form
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineImage { mime: String, data: Bytes },
    File(RemoteFile),
}

/// A role-merged message ready for a provider's wire encoding
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

/// Completion request handed to a [`super::ChatProvider`]
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub params: ModelParameters,
    pub system_instruction: String,
    pub messages: Vec<NormalizedMessage>,
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Events produced while streaming a reply
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Usage(Usage),
    /// Provider refused to answer (safety filters)
    Blocked(String),
    Error(String),
    Done,
}
