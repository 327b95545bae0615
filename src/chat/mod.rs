//! Multi-modal chat pipeline
//!
//! - `content` / `history`: the conversation model
//! - `attachments`: local staging for binary payloads
//! - `normalizer`: history → provider messages, uploading as needed
//! - `provider`: Gemini and Groq adapters plus the file upload client
//! - `streamer` / `service`: request flow and incremental replies
//! - `session`: per-user state and input intake

pub mod attachments;
pub mod content;
pub mod history;
pub mod intake;
pub mod normalizer;
pub mod provider;
pub mod service;
pub mod session;
pub mod streamer;

pub use attachments::{AttachmentStore, StagedAttachment};
pub use content::{Attachment, AttachmentId, ContentItem, ContentKind, Role, SPEECH_PROMPT, Turn};
pub use history::ConversationHistory;
pub use normalizer::MessageNormalizer;
pub use service::{ChatService, DEFAULT_SYSTEM_INSTRUCTION};
pub use session::{ResetReport, SessionState};
pub use streamer::ReplyStream;
