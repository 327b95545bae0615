//! Request flow: append prompt → normalize → stream reply

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use super::content::ContentKind;
use super::intake::classify_upload;
use super::normalizer::MessageNormalizer;
use super::provider::{ChatProvider, ChatRequest, ModelParameters, ProviderAdapter, UploadClient};
use super::session::{ResetReport, SessionState};
use super::streamer::ReplyStream;
use crate::error::{ChatError, ChatResult};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant who answers user's questions professionally and politely.";

pub struct ChatService {
    provider: Arc<dyn ChatProvider>,
    uploader: Option<UploadClient>,
    params: ModelParameters,
    system_instruction: String,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ChatProvider>, params: ModelParameters) -> Self {
        Self {
            provider,
            uploader: None,
            params,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_uploader(mut self, uploader: UploadClient) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// Whether content of this kind can be sent with the current provider
    ///
    /// Uploaded kinds also need a file API to send them through.
    pub fn accepts(&self, kind: ContentKind) -> bool {
        let needs_upload = matches!(
            kind,
            ContentKind::Video | ContentKind::Audio | ContentKind::SpeechInput | ContentKind::Pdf
        );
        self.provider.accepts(kind) && (!needs_upload || self.uploader.is_some())
    }

    fn ensure_accepted(&self, kind: ContentKind) -> ChatResult<()> {
        if self.accepts(kind) {
            return Ok(());
        }
        warn!("Refusing {} attachment for {}", kind, self.provider.name());
        Err(ChatError::UnsupportedContent {
            provider: self.provider.name(),
            kind,
        })
    }

    /// Add an uploaded file, refusing kinds the provider cannot carry
    ///
    /// A refused file never reaches history, so later prompts still send.
    pub async fn add_upload(
        &self,
        session: &mut SessionState,
        bytes: impl Into<Bytes>,
        declared_mime: &str,
        file_name: &str,
    ) -> ChatResult<ContentKind> {
        let (kind, _) = classify_upload(declared_mime, file_name)?;
        self.ensure_accepted(kind)?;
        session.add_upload(bytes, declared_mime, file_name).await
    }

    pub async fn add_speech(&self, session: &mut SessionState, bytes: impl Into<Bytes>) -> ChatResult<bool> {
        self.ensure_accepted(ContentKind::SpeechInput)?;
        session.add_speech(bytes).await
    }

    pub fn add_camera_image(&self, session: &mut SessionState, bytes: impl Into<Bytes>) -> ChatResult<()> {
        self.ensure_accepted(ContentKind::Image)?;
        session.add_camera_image(bytes);
        Ok(())
    }

    /// Append the prompt and start streaming the reply
    ///
    /// The user turn stays in history when anything after it fails.
    pub async fn send<'s>(&self, session: &'s mut SessionState, prompt: &str) -> ChatResult<ReplyStream<'s>> {
        session.push_prompt(prompt)?;

        let normalizer = MessageNormalizer::new(self.provider.as_ref(), self.uploader.as_ref());
        let messages = normalizer
            .normalize(session.history.all(), &mut session.attachments)
            .await?;

        info!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.provider.name(),
            self.params.model()
        );

        let rx = self
            .provider
            .create_stream(ChatRequest {
                params: self.params.clone(),
                system_instruction: self.system_instruction.clone(),
                messages,
            })
            .await?;

        Ok(ReplyStream::new(&mut session.history, rx))
    }

    /// Clear the session and delete remote files through this service's uploader
    pub async fn reset(&self, session: &mut SessionState) -> ResetReport {
        session.reset(self.uploader.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::content::Role;
    use crate::error::ChatError;
    use crate::testing::{MockChatProvider, MockFileApi, tiny_png};

    fn service(provider: &Arc<MockChatProvider>) -> ChatService {
        ChatService::new(
            provider.clone(),
            ModelParameters::with_defaults("gemini-1.5-flash").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_send_appends_both_turns() {
        let provider = Arc::new(MockChatProvider::new(&["Hi ", "there"]));
        let mut session = SessionState::new().unwrap();

        let reply = service(&provider)
            .send(&mut session, "hello")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(reply, "Hi there");
        let roles: Vec<_> = session.history().all().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);

        let request = provider.last_request().unwrap();
        assert_eq!(request.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(request.params.max_tokens(), 400);
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_user_turn() {
        let provider = Arc::new(MockChatProvider::new(&[]).rejecting(429));
        let mut session = SessionState::new().unwrap();

        let err = service(&provider).send(&mut session, "hello").await.err().unwrap();

        assert!(matches!(err, ChatError::Api { status: 429, .. }));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_refused_attachment_keeps_history_sendable() {
        let provider = Arc::new(MockChatProvider::new(&["hello"]).without_remote_files());
        let chat = service(&provider);
        let mut session = SessionState::new().unwrap();

        let err = chat
            .add_upload(&mut session, vec![0u8; 16], "", "clip.mp4")
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ChatError::UnsupportedContent {
                kind: ContentKind::Video,
                ..
            }
        ));
        assert!(session.history().is_empty());
        assert_eq!(session.attachments().staged_count(), 0);

        let reply = chat
            .send(&mut session, "just say hello")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(reply, "hello");
    }

    #[tokio::test]
    async fn test_uploaded_kinds_need_a_file_api() {
        let provider = Arc::new(MockChatProvider::new(&[]));
        let api = Arc::new(MockFileApi::new());
        let bare = service(&provider);
        let with_files = service(&provider).with_uploader(UploadClient::new(api));

        assert!(bare.accepts(ContentKind::Text));
        assert!(bare.accepts(ContentKind::Image));
        assert!(!bare.accepts(ContentKind::Pdf));
        assert!(with_files.accepts(ContentKind::Pdf));
        assert!(with_files.accepts(ContentKind::SpeechInput));

        let mut session = SessionState::new().unwrap();
        assert!(matches!(
            bare.add_speech(&mut session, vec![1u8, 2]).await,
            Err(ChatError::UnsupportedContent { .. })
        ));
        assert!(!session.speech_pending());

        bare.add_camera_image(&mut session, tiny_png()).unwrap();
        assert_eq!(session.history().len(), 1);
    }
}
