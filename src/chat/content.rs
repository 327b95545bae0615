//! Conversation content model
//!
//! A [`Turn`] is one role's contribution; it owns an ordered list of
//! [`ContentItem`]s. Binary items that must be uploaded before a provider can
//! reference them carry an [`Attachment`] with a stable id.

use bytes::Bytes;
use std::fmt;

/// Fixed prompt injected when the user submits a voice recording
pub const SPEECH_PROMPT: &str = "Listen attentively to the audio. If there is a question in the audio, answer it professionally.";

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Identifier assigned once when an attachment is staged
///
/// Doubles as the remote dedup key: the staged file is named `{id}.{ext}` and
/// the provider sees that file name as its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentId(String);

impl AttachmentId {
    pub fn generate(kind: ContentKind) -> Self {
        Self(format!("{}_{}", kind.id_prefix(), uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key compared against remote display names (stem only)
    pub fn dedup_key(&self) -> &str {
        file_stem(&self.0)
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttachmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Everything before the first `.` of a file name
pub fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Kind tag for each content variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Audio,
    SpeechInput,
    Pdf,
    DocxText,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::SpeechInput => "speech",
            ContentKind::Pdf => "pdf",
            ContentKind::DocxText => "docx",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::SpeechInput => "speech",
            ContentKind::Pdf => "pdf",
            _ => "temp",
        }
    }

    /// File extension used when staging this kind to disk
    pub fn extension(&self, mime: &str) -> &'static str {
        match self {
            ContentKind::Video => "mp4",
            ContentKind::Pdf => "pdf",
            ContentKind::SpeechInput => "wav",
            ContentKind::Audio => match mime {
                "audio/mpeg" | "audio/mp3" => "mp3",
                _ => "wav",
            },
            _ => "bin",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary payload that needs a remote upload before it can be referenced
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: AttachmentId,
    pub mime: String,
    pub bytes: Bytes,
}

impl Attachment {
    /// Staged file name, also used as the remote display name
    pub fn file_name(&self, kind: ContentKind) -> String {
        format!("{}.{}", self.id, kind.extension(&self.mime))
    }
}

/// A single typed piece of content within a turn
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text { body: String },
    Image { bytes: Bytes, mime: String },
    Video(Attachment),
    Audio(Attachment),
    SpeechInput(Attachment),
    Pdf(Attachment),
    DocxText { body: String },
}

impl ContentItem {
    pub fn text(body: impl Into<String>) -> Self {
        ContentItem::Text { body: body.into() }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Text { .. } => ContentKind::Text,
            ContentItem::Image { .. } => ContentKind::Image,
            ContentItem::Video(_) => ContentKind::Video,
            ContentItem::Audio(_) => ContentKind::Audio,
            ContentItem::SpeechInput(_) => ContentKind::SpeechInput,
            ContentItem::Pdf(_) => ContentKind::Pdf,
            ContentItem::DocxText { .. } => ContentKind::DocxText,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            ContentItem::Video(a)
            | ContentItem::Audio(a)
            | ContentItem::SpeechInput(a)
            | ContentItem::Pdf(a) => Some(a),
            ContentItem::Text { .. } | ContentItem::Image { .. } | ContentItem::DocxText { .. } => {
                None
            }
        }
    }

    /// Whether a UI should render this item
    ///
    /// Documents and the injected speech prompt are still sent to the
    /// provider; they are only hidden from display.
    pub fn is_displayable(&self) -> bool {
        match self {
            ContentItem::Text { body } => body != SPEECH_PROMPT,
            ContentItem::Pdf(_) | ContentItem::DocxText { .. } => false,
            ContentItem::Image { .. }
            | ContentItem::Video(_)
            | ContentItem::Audio(_)
            | ContentItem::SpeechInput(_) => true,
        }
    }
}

/// One role's contribution to the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

impl Turn {
    pub fn user(content: Vec<ContentItem>) -> Self {
        Self { role: Role::User, content }
    }

    pub fn assistant_text(body: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentItem::text(body)],
        }
    }

    /// Items a UI should render, in order
    pub fn displayable(&self) -> impl Iterator<Item = &ContentItem> {
        self.content.iter().filter(|c| c.is_displayable())
    }
}
