//! Error types for the chat pipeline
//!
//! Every library operation returns [`ChatResult`]. The binary converts these
//! into a single user-visible line at the request boundary.

use crate::chat::content::{AttachmentId, ContentKind};

/// Errors raised while staging, normalizing, uploading or streaming
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Transient upload failure: {0}")]
    TransientUpload(String),

    #[error("Upload failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Remote processing failed for {name}: {reason}")]
    ProcessingFailed { name: String, reason: String },

    #[error("Remote processing of {name} did not finish within {waited_secs}s")]
    ProcessingTimeout { name: String, waited_secs: u64 },

    #[error("{provider} cannot accept {kind} content")]
    UnsupportedContent {
        provider: &'static str,
        kind: ContentKind,
    },

    #[error("Unsupported upload type: {0}")]
    UnsupportedUpload(String),

    #[error("Attachment {0} is not staged")]
    AttachmentNotStaged(AttachmentId),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("{provider} API error: {status} - {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Response blocked by provider: {0}")]
    Blocked(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Whether a retry of the same submission may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::TransientUpload(_) => true,
            ChatError::Api { status, body, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
                    || body.contains("FAILED_PRECONDITION")
            }
            ChatError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ChatError::TransientUpload("precondition".into()).is_transient());
        assert!(
            ChatError::Api {
                provider: "gemini",
                status: 503,
                body: String::new(),
            }
            .is_transient()
        );
        assert!(
            ChatError::Api {
                provider: "gemini",
                status: 400,
                body: r#"{"error":{"status":"FAILED_PRECONDITION"}}"#.into(),
            }
            .is_transient()
        );
        assert!(
            !ChatError::Api {
                provider: "gemini",
                status: 400,
                body: "bad request".into(),
            }
            .is_transient()
        );
        assert!(
            !ChatError::ProcessingFailed {
                name: "files/abc".into(),
                reason: "FAILED".into(),
            }
            .is_transient()
        );
    }
}
