//! Per-user session state
//!
//! Owns the conversation history and the local attachment store, plus the
//! small amount of bookkeeping needed for voice input.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::attachments::AttachmentStore;
use super::content::{ContentItem, ContentKind, SPEECH_PROMPT, Turn};
use super::history::ConversationHistory;
use super::intake::{classify_upload, extract_docx_text};
use super::provider::UploadClient;
use crate::error::{ChatError, ChatResult};

/// What a reset removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub turns_cleared: usize,
    pub staged_released: usize,
    pub remote_deleted: usize,
    pub remote_failed: usize,
}

pub struct SessionState {
    pub(crate) history: ConversationHistory,
    pub(crate) attachments: AttachmentStore,
    last_speech_digest: Option<[u8; 32]>,
    speech_pending: bool,
}

impl SessionState {
    /// Session staging into a private temporary directory
    pub fn new() -> ChatResult<Self> {
        Ok(Self::with_store(AttachmentStore::temporary()?))
    }

    pub fn with_store(attachments: AttachmentStore) -> Self {
        Self {
            history: ConversationHistory::new(),
            attachments,
            last_speech_digest: None,
            speech_pending: false,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// A recording was added and not yet answered
    pub fn speech_pending(&self) -> bool {
        self.speech_pending
    }

    pub fn add_text(&mut self, prompt: impl Into<String>) {
        self.history.append(Turn::user(vec![ContentItem::text(prompt)]));
    }

    /// Classify an uploaded file and append it as a user turn
    pub async fn add_upload(
        &mut self,
        bytes: impl Into<Bytes>,
        declared_mime: &str,
        file_name: &str,
    ) -> ChatResult<ContentKind> {
        let (kind, mime) = classify_upload(declared_mime, file_name)?;
        let bytes = bytes.into();

        let item = match kind {
            ContentKind::Image => ContentItem::Image { bytes, mime },
            ContentKind::DocxText => ContentItem::DocxText {
                body: extract_docx_text(&bytes)?,
            },
            ContentKind::Video | ContentKind::Audio | ContentKind::Pdf => {
                self.attachments.stage(bytes, &mime, kind).await?
            }
            ContentKind::Text | ContentKind::SpeechInput => {
                return Err(ChatError::UnsupportedUpload(file_name.to_string()));
            }
        };

        info!("Added {} upload {}", kind, file_name);
        self.history.append(Turn::user(vec![item]));
        Ok(kind)
    }

    /// Photo taken with a camera; always JPEG
    pub fn add_camera_image(&mut self, bytes: impl Into<Bytes>) {
        self.history.append(Turn::user(vec![ContentItem::Image {
            bytes: bytes.into(),
            mime: "image/jpeg".to_string(),
        }]));
    }

    /// Add a voice recording unless it is the same one as last time
    ///
    /// Returns whether the recording was added.
    pub async fn add_speech(&mut self, bytes: impl Into<Bytes>) -> ChatResult<bool> {
        let bytes = bytes.into();
        let digest: [u8; 32] = Sha256::digest(&bytes).into();

        if self.last_speech_digest == Some(digest) {
            debug!("Ignoring repeated speech recording");
            return Ok(false);
        }

        let item = self
            .attachments
            .stage(bytes, "audio/wav", ContentKind::SpeechInput)
            .await?;
        self.history.append(Turn::user(vec![item]));
        self.last_speech_digest = Some(digest);
        self.speech_pending = true;
        Ok(true)
    }

    /// Append the user prompt for the next request
    ///
    /// A pending recording is answered through the fixed speech prompt
    /// instead of the typed text.
    pub(crate) fn push_prompt(&mut self, prompt: &str) -> ChatResult<()> {
        if self.speech_pending {
            self.speech_pending = false;
            self.add_text(SPEECH_PROMPT);
            return Ok(());
        }
        if prompt.trim().is_empty() {
            return Err(ChatError::InvalidParameters("prompt is empty".into()));
        }
        self.add_text(prompt);
        Ok(())
    }

    /// Clear history, local staging and (best effort) remote files
    pub async fn reset(&mut self, uploader: Option<&UploadClient>) -> ResetReport {
        let mut report = ResetReport {
            turns_cleared: self.history.clear(),
            staged_released: self.attachments.release_all(),
            ..ResetReport::default()
        };
        self.last_speech_digest = None;
        self.speech_pending = false;

        if let Some(uploader) = uploader {
            let purge = uploader.delete_all().await;
            report.remote_deleted = purge.deleted;
            report.remote_failed = purge.failed;
        }

        info!(
            "Session reset: {} turns, {} staged, {} remote deleted ({} failed)",
            report.turns_cleared, report.staged_released, report.remote_deleted, report.remote_failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::content::Role;
    use crate::testing::{docx_bytes, tiny_png};

    #[tokio::test]
    async fn test_upload_kinds() {
        let mut session = SessionState::new().unwrap();

        assert_eq!(
            session.add_upload(tiny_png(), "image/png", "a.png").await.unwrap(),
            ContentKind::Image
        );
        assert_eq!(
            session.add_upload(vec![0u8; 4], "video/mp4", "v.mp4").await.unwrap(),
            ContentKind::Video
        );
        assert_eq!(
            session
                .add_upload(docx_bytes(&["hello"]), "", "notes.docx")
                .await
                .unwrap(),
            ContentKind::DocxText
        );
        assert!(session.add_upload(vec![1u8], "text/csv", "t.csv").await.is_err());

        assert_eq!(session.history().len(), 3);
        assert_eq!(session.attachments().staged_count(), 1);
        assert_eq!(
            session.history().last().unwrap().content,
            vec![ContentItem::DocxText {
                body: "hello".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_repeated_speech_ignored() {
        let mut session = SessionState::new().unwrap();

        assert!(session.add_speech(vec![1u8, 2, 3]).await.unwrap());
        assert!(!session.add_speech(vec![1u8, 2, 3]).await.unwrap());
        assert!(session.add_speech(vec![4u8, 5]).await.unwrap());

        assert_eq!(session.history().len(), 2);
        assert!(session.speech_pending());
    }

    #[tokio::test]
    async fn test_pending_speech_uses_fixed_prompt() {
        let mut session = SessionState::new().unwrap();
        session.add_speech(vec![7u8; 10]).await.unwrap();

        session.push_prompt("ignored").unwrap();

        let last = session.history().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, vec![ContentItem::text(SPEECH_PROMPT)]);
        assert_eq!(last.displayable().count(), 0);
        assert!(!session.speech_pending());

        assert!(session.push_prompt("  ").is_err());
        session.push_prompt("next").unwrap();
        assert_eq!(session.history().len(), 3);
    }

    #[tokio::test]
    async fn test_reset_without_uploader() {
        let mut session = SessionState::new().unwrap();
        session.add_text("hello");
        session.add_speech(vec![1u8]).await.unwrap();

        let report = session.reset(None).await;

        assert_eq!(report.turns_cleared, 2);
        assert_eq!(report.staged_released, 1);
        assert!(session.history().is_empty());
        assert!(!session.speech_pending());
        // Same recording is accepted again after a reset
        assert!(session.add_speech(vec![1u8]).await.unwrap());
    }
}
