//! History → provider message list
//!
//! Runs just before every completion request. Reads the history without
//! mutating it, folds consecutive same-role turns into one message and
//! translates every content item through the provider adapter. Binary
//! attachments the provider already holds are referenced; the rest are
//! uploaded, and their staged copies are released whatever the outcome.

use bytes::Bytes;
use tracing::debug;

use super::attachments::AttachmentStore;
use super::content::{Attachment, ContentItem, ContentKind, Role, Turn};
use super::intake::decode_image;
use super::provider::{
    FileState, NormalizedMessage, Part, ProviderAdapter, RemoteAttachmentRegistry, UploadClient,
};
use crate::error::{ChatError, ChatResult};

pub struct MessageNormalizer<'a> {
    adapter: &'a dyn ProviderAdapter,
    uploader: Option<&'a UploadClient>,
}

impl<'a> MessageNormalizer<'a> {
    pub fn new(adapter: &'a dyn ProviderAdapter, uploader: Option<&'a UploadClient>) -> Self {
        Self { adapter, uploader }
    }

    pub async fn normalize(
        &self,
        turns: &[Turn],
        store: &mut AttachmentStore,
    ) -> ChatResult<Vec<NormalizedMessage>> {
        let registry = self.registry_for(turns).await?;

        let mut messages: Vec<NormalizedMessage> = Vec::new();
        let mut previous_role: Option<Role> = None;

        for turn in turns {
            let mut parts = Vec::with_capacity(turn.content.len());
            for item in &turn.content {
                parts.push(self.translate(item, &registry, store).await?);
            }

            match messages.last_mut() {
                Some(last) if previous_role == Some(turn.role) => last.parts.extend(parts),
                _ => messages.push(NormalizedMessage {
                    role: self.adapter.role_label(turn.role),
                    parts,
                }),
            }
            previous_role = Some(turn.role);
        }

        debug!(
            "Normalized {} turns into {} {} messages",
            turns.len(),
            messages.len(),
            self.adapter.name()
        );
        Ok(messages)
    }

    /// Query the provider only when some item could need an upload
    async fn registry_for(&self, turns: &[Turn]) -> ChatResult<RemoteAttachmentRegistry> {
        let needs_remote = turns
            .iter()
            .flat_map(|t| t.content.iter())
            .any(|item| item.attachment().is_some());

        match self.uploader {
            Some(uploader) if needs_remote && self.adapter.accepts_remote_files() => {
                uploader.registry().await
            }
            _ => Ok(RemoteAttachmentRegistry::default()),
        }
    }

    async fn translate(
        &self,
        item: &ContentItem,
        registry: &RemoteAttachmentRegistry,
        store: &mut AttachmentStore,
    ) -> ChatResult<Part> {
        match item {
            ContentItem::Text { body } | ContentItem::DocxText { body } => Ok(Part::Text(body.clone())),
            ContentItem::Image { bytes, .. } => self.image_part(bytes),
            ContentItem::Video(attachment)
            | ContentItem::Audio(attachment)
            | ContentItem::SpeechInput(attachment)
            | ContentItem::Pdf(attachment) => {
                self.remote_part(item.kind(), attachment, registry, store).await
            }
        }
    }

    fn image_part(&self, bytes: &Bytes) -> ChatResult<Part> {
        if !self.adapter.accepts_inline_images() {
            return Err(self.unsupported(ContentKind::Image));
        }
        let mime = decode_image(bytes)?;
        Ok(Part::InlineImage {
            mime: mime.to_string(),
            data: bytes.clone(),
        })
    }

    async fn remote_part(
        &self,
        kind: ContentKind,
        attachment: &Attachment,
        registry: &RemoteAttachmentRegistry,
        store: &mut AttachmentStore,
    ) -> ChatResult<Part> {
        let uploader = match self.uploader {
            Some(uploader) if self.adapter.accepts_remote_files() => uploader,
            _ => return Err(self.unsupported(kind)),
        };

        if let Some(existing) = registry.lookup(attachment.id.dedup_key()) {
            debug!("{} already held remotely as {}", attachment.id, existing.name);
            store.release(&attachment.id);
            let file = match existing.state {
                FileState::Active => existing.clone(),
                _ => uploader.wait_until_ready(existing.clone()).await?,
            };
            return Ok(Part::File(file));
        }

        let staged = store.acquire(kind, attachment).await?;
        let uploaded = uploader.upload(staged.path(), &attachment.mime).await;
        drop(staged);

        Ok(Part::File(uploaded?))
    }

    fn unsupported(&self, kind: ContentKind) -> ChatError {
        ChatError::UnsupportedContent {
            provider: self.adapter.name(),
            kind,
        }
    }
}
