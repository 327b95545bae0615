//! Gemini File API client
//!
//! Video, audio, speech and PDF attachments go through here. Uploaded files
//! start in `PROCESSING` and are polled by [`super::UploadClient`].

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::gemini::GEMINI_API_BASE;
use super::streaming::ensure_success;
use super::{FileApi, FileState, RemoteFile};
use crate::error::ChatResult;

const UPLOAD_BASE: &str = "https://generativelanguage.googleapis.com/upload/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const UPLOAD_TIMEOUT_SECS: u64 = 300;
const LIST_PAGE_SIZE: u32 = 100;
const PROVIDER: &str = "gemini";

pub struct GeminiFileClient {
    client: HttpClient,
    api_key: String,
    api_base: String,
    upload_base: String,
}

impl GeminiFileClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            api_base: GEMINI_API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        }
    }

    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Accepts both `files/abc` and a bare `abc`
    fn resource_url(&self, name: &str) -> String {
        let name = if name.starts_with("files/") {
            name.to_string()
        } else {
            format!("files/{}", name)
        };
        format!("{}/{}?key={}", self.api_base, name, self.api_key)
    }
}

#[async_trait]
impl FileApi for GeminiFileClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn upload(&self, path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile> {
        let content = tokio::fs::read(path).await?;
        let size = content.len();

        let metadata = serde_json::json!({
            "file": { "displayName": display_name }
        });

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(content)
                    .file_name(display_name.to_string())
                    .mime_str(mime_type)?,
            );

        let url = format!("{}/files?key={}", self.upload_base, self.api_key);
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .send()
            .await?;
        let response = ensure_success(PROVIDER, response).await?;

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!(
            "Submitted {} ({} bytes) as {}",
            display_name,
            size,
            uploaded.file.name
        );
        Ok(uploaded.file.into())
    }

    async fn get(&self, name: &str) -> ChatResult<RemoteFile> {
        let response = self
            .client
            .get(self.resource_url(name))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;
        let response = ensure_success(PROVIDER, response).await?;

        let file: GeminiFile = response.json().await?;
        Ok(file.into())
    }

    async fn list(&self) -> ChatResult<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/files?pageSize={}&key={}",
                self.api_base, LIST_PAGE_SIZE, self.api_key
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let response = self
                .client
                .get(&url)
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .send()
                .await?;
            let response = ensure_success(PROVIDER, response).await?;

            let page: ListFilesResponse = response.json().await?;
            files.extend(page.files.unwrap_or_default().into_iter().map(RemoteFile::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Listed {} remote files", files.len());
        Ok(files)
    }

    async fn delete(&self, name: &str) -> ChatResult<()> {
        let response = self
            .client
            .delete(self.resource_url(name))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;
        ensure_success(PROVIDER, response).await?;
        Ok(())
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    files: Option<Vec<GeminiFile>>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    uri: String,
    state: Option<String>,
    error: Option<GeminiFileError>,
}

#[derive(Deserialize)]
struct GeminiFileError {
    message: Option<String>,
}

impl From<GeminiFile> for RemoteFile {
    fn from(file: GeminiFile) -> Self {
        RemoteFile {
            name: file.name,
            display_name: file.display_name,
            mime_type: file.mime_type,
            uri: file.uri,
            state: file
                .state
                .as_deref()
                .map(FileState::parse)
                .unwrap_or(FileState::Unspecified),
            error: file.error.and_then(|e| e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_wire_mapping() {
        let json = r#"{
            "name": "files/abc123",
            "displayName": "video_9f.mp4",
            "mimeType": "video/mp4",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "state": "PROCESSING"
        }"#;
        let file: RemoteFile = serde_json::from_str::<GeminiFile>(json).unwrap().into();

        assert_eq!(file.name, "files/abc123");
        assert_eq!(file.display_name.as_deref(), Some("video_9f.mp4"));
        assert_eq!(file.state, FileState::Processing);
        assert!(file.error.is_none());
    }

    #[test]
    fn test_failed_file_carries_reason() {
        let json = r#"{"name":"files/x","state":"FAILED","error":{"code":3,"message":"bad codec"}}"#;
        let file: RemoteFile = serde_json::from_str::<GeminiFile>(json).unwrap().into();

        assert_eq!(file.state, FileState::Failed);
        assert_eq!(file.error.as_deref(), Some("bad codec"));
    }

    #[test]
    fn test_list_page() {
        let json = r#"{"files":[{"name":"files/a"},{"name":"files/b"}],"nextPageToken":"tok"}"#;
        let page: ListFilesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.files.unwrap().len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));

        let empty: ListFilesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.files.is_none());
    }

    #[test]
    fn test_resource_url() {
        let client = GeminiFileClient::new("k".into()).with_base_urls("http://api", "http://up");
        assert_eq!(client.resource_url("files/a"), "http://api/files/a?key=k");
        assert_eq!(client.resource_url("a"), "http://api/files/a?key=k");
    }
}
