//! Local staging for binary attachments
//!
//! Uploads read from disk, so every video/audio/speech/PDF payload gets a
//! file `{attachment_id}.{ext}` in the staging directory. Files are removed
//! as soon as the remote call that consumed them returns, and whatever is
//! still staged is removed when the store is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::content::{Attachment, AttachmentId, ContentItem, ContentKind};
use crate::error::{ChatError, ChatResult};

pub struct AttachmentStore {
    dir: PathBuf,
    // Held so the directory lives as long as the store
    _temp: Option<TempDir>,
    staged: HashMap<AttachmentId, PathBuf>,
}

impl AttachmentStore {
    /// Store backed by a fresh temporary directory, removed on drop
    pub fn temporary() -> ChatResult<Self> {
        let temp = tempfile::Builder::new().prefix("superchat-").tempdir()?;
        Ok(Self {
            dir: temp.path().to_path_buf(),
            _temp: Some(temp),
            staged: HashMap::new(),
        })
    }

    /// Store backed by a caller-chosen directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> ChatResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            _temp: None,
            staged: HashMap::new(),
        })
    }

    /// Stage raw bytes and return the content item that refers to them
    pub async fn stage(
        &mut self,
        raw: impl Into<Bytes>,
        mime: &str,
        kind: ContentKind,
    ) -> ChatResult<ContentItem> {
        let wrap: fn(Attachment) -> ContentItem = match kind {
            ContentKind::Video => ContentItem::Video,
            ContentKind::Audio => ContentItem::Audio,
            ContentKind::SpeechInput => ContentItem::SpeechInput,
            ContentKind::Pdf => ContentItem::Pdf,
            ContentKind::Text | ContentKind::Image | ContentKind::DocxText => {
                return Err(ChatError::UnsupportedUpload(format!(
                    "{} content is not staged",
                    kind
                )));
            }
        };

        let attachment = Attachment {
            id: AttachmentId::generate(kind),
            mime: mime.to_string(),
            bytes: raw.into(),
        };
        self.write(kind, &attachment).await?;
        Ok(wrap(attachment))
    }

    /// Read back the staged bytes
    pub async fn read(&self, id: &AttachmentId) -> ChatResult<Vec<u8>> {
        let path = self
            .staged
            .get(id)
            .ok_or_else(|| ChatError::AttachmentNotStaged(id.clone()))?;
        Ok(tokio::fs::read(path).await?)
    }

    pub fn path(&self, id: &AttachmentId) -> Option<&Path> {
        self.staged.get(id).map(|p| p.as_path())
    }

    pub fn is_staged(&self, id: &AttachmentId) -> bool {
        self.staged.contains_key(id)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Make sure the attachment is on disk and hand out a guard that
    /// releases it when dropped, on success and error paths alike
    pub async fn acquire(
        &mut self,
        kind: ContentKind,
        attachment: &Attachment,
    ) -> ChatResult<StagedAttachment<'_>> {
        let present = match self.staged.get(&attachment.id) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        };
        if !present {
            self.write(kind, attachment).await?;
        }

        let path = self
            .staged
            .get(&attachment.id)
            .cloned()
            .ok_or_else(|| ChatError::AttachmentNotStaged(attachment.id.clone()))?;

        Ok(StagedAttachment {
            store: self,
            id: attachment.id.clone(),
            path,
        })
    }

    /// Discard a staged artifact; returns whether anything was removed
    pub fn release(&mut self, id: &AttachmentId) -> bool {
        let Some(path) = self.staged.remove(id) else {
            return false;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Released staged attachment {}", id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
        true
    }

    /// Discard everything staged so far
    pub fn release_all(&mut self) -> usize {
        let ids: Vec<AttachmentId> = self.staged.keys().cloned().collect();
        ids.iter().filter(|id| self.release(id)).count()
    }

    async fn write(&mut self, kind: ContentKind, attachment: &Attachment) -> ChatResult<()> {
        let path = self.dir.join(attachment.file_name(kind));
        tokio::fs::write(&path, &attachment.bytes).await?;
        debug!(
            "Staged {} ({} bytes) at {}",
            attachment.id,
            attachment.bytes.len(),
            path.display()
        );
        self.staged.insert(attachment.id.clone(), path);
        Ok(())
    }
}

impl Drop for AttachmentStore {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            debug!("Released {} staged attachments on shutdown", released);
        }
    }
}

/// Scoped handle on a staged file
pub struct StagedAttachment<'a> {
    store: &'a mut AttachmentStore,
    id: AttachmentId,
    path: PathBuf,
}

impl StagedAttachment<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedAttachment<'_> {
    fn drop(&mut self) {
        self.store.release(&self.id);
    }
}
