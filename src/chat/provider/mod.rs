//! Provider abstraction for Gemini and Groq
//!
//! - [`ProviderAdapter`] is the strategy the normalizer consults for role
//!   labels and accepted content
//! - [`ChatProvider`] issues the streamed completion call
//! - [`FileApi`] wraps a provider's asynchronous file ingestion

mod catalog;
mod gemini;
mod gemini_files;
mod groq;
mod streaming;
mod types;
mod upload;

pub use catalog::{ProviderKind, available_models, is_plausible_key, GOOGLE_MODELS, GROQ_MODELS};
pub use gemini::GeminiProvider;
pub use gemini_files::GeminiFileClient;
pub use groq::GroqProvider;
pub use types::*;
pub use upload::{PurgeReport, RemoteAttachmentRegistry, UploadClient};

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chat::content::{ContentKind, Role};
use crate::error::ChatResult;

/// Per-provider translation rules used during normalization
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging and errors
    fn name(&self) -> &'static str;

    /// Wire label for a conversation role
    fn role_label(&self, role: Role) -> &'static str;

    /// Whether images can be sent inline
    fn accepts_inline_images(&self) -> bool;

    /// Whether uploaded file references can be sent
    fn accepts_remote_files(&self) -> bool;

    /// Whether content of this kind can reach the provider at all
    fn accepts(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Text | ContentKind::DocxText => true,
            ContentKind::Image => self.accepts_inline_images(),
            ContentKind::Video | ContentKind::Audio | ContentKind::SpeechInput | ContentKind::Pdf => {
                self.accepts_remote_files()
            }
        }
    }
}

/// Streamed completion endpoint
#[async_trait]
pub trait ChatProvider: ProviderAdapter {
    /// Start a completion; fragments arrive on the returned channel in
    /// provider order, terminated by `Done` or `Error`
    async fn create_stream(&self, request: ChatRequest) -> ChatResult<mpsc::Receiver<StreamEvent>>;
}

/// Remote file ingestion endpoint
#[async_trait]
pub trait FileApi: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit a local file; the returned state is usually `Processing`
    async fn upload(&self, path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile>;

    async fn get(&self, name: &str) -> ChatResult<RemoteFile>;

    async fn list(&self) -> ChatResult<Vec<RemoteFile>>;

    async fn delete(&self, name: &str) -> ChatResult<()>;
}
