//! Configuration file support
//!
//! Loads config from ~/.superchat/config.toml. Every key is optional;
//! CLI flags and environment variables take precedence (resolved in main).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::chat::provider::{FileApi, UploadClient};
use crate::core::{BackoffKind, RetryPolicy};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_PROCESSING_WAIT_SECS: u64 = 600;
const DEFAULT_UPLOAD_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_UPLOAD_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Google AI Studio key (Gemini chat + File API)
    pub google_api_key: Option<String>,

    /// Groq key
    pub groq_api_key: Option<String>,

    /// Default model
    pub model: Option<String>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    /// Overrides the default system instruction
    pub system_instruction: Option<String>,

    /// Where attachments are staged before upload (temp dir if unset)
    pub staging_dir: Option<PathBuf>,

    pub poll_interval_secs: Option<u64>,

    /// Give up on a file still processing after this long
    pub max_processing_wait_secs: Option<u64>,

    pub upload_max_attempts: Option<u32>,

    pub upload_backoff_ms: Option<u64>,

    pub upload_backoff: Option<BackoffKind>,
}

impl Config {
    /// Load config from ~/.superchat/config.toml
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Missing or unreadable files yield the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_kind(
            self.upload_max_attempts.unwrap_or(DEFAULT_UPLOAD_MAX_ATTEMPTS),
            self.upload_backoff.unwrap_or_default(),
            Duration::from_millis(self.upload_backoff_ms.unwrap_or(DEFAULT_UPLOAD_BACKOFF_MS)),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn max_processing_wait(&self) -> Duration {
        Duration::from_secs(
            self.max_processing_wait_secs
                .unwrap_or(DEFAULT_MAX_PROCESSING_WAIT_SECS),
        )
    }

    /// Upload client over `files` with this config's retry and polling
    pub fn upload_client(&self, files: Arc<dyn FileApi>) -> UploadClient {
        UploadClient::new(files)
            .with_retry(self.retry_policy())
            .with_poll_interval(self.poll_interval())
            .with_max_wait(self.max_processing_wait())
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".superchat")
        .join("config.toml")
}
