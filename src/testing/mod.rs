// src/testing/mod.rs
// Scripted stand-ins for the provider seams, plus small fixtures

use std::collections::{HashSet, VecDeque};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chat::content::Role;
use crate::chat::provider::{
    ChatProvider, ChatRequest, FileApi, FileState, ProviderAdapter, RemoteFile, StreamEvent,
};
use crate::error::{ChatError, ChatResult};

/// Active remote file with a display name, as the provider would list it
pub fn remote_file(name: &str, display_name: &str) -> RemoteFile {
    RemoteFile {
        name: name.to_string(),
        display_name: Some(display_name.to_string()),
        mime_type: mime_guess::from_path(display_name)
            .first_or_octet_stream()
            .to_string(),
        uri: format!("https://files.test/v1beta/{}", name),
        state: FileState::Active,
        error: None,
    }
}

/// A 2x2 PNG
pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}

/// Minimal .docx archive with one `w:p` per paragraph
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .expect("start docx entry");
    writer.write_all(xml.as_bytes()).expect("write docx entry");
    writer.finish().expect("finish docx").into_inner()
}

// ============================================================================
// File API
// ============================================================================

#[derive(Default)]
struct FileApiState {
    remote: Vec<RemoteFile>,
    states: VecDeque<FileState>,
    transient_failures: u32,
    failing_deletes: HashSet<String>,
    deleted: Vec<String>,
    next_id: u32,
}

/// In-memory [`FileApi`] with scripted processing states
///
/// Each upload and each `get` consumes the next queued state; once the
/// queue is empty the file keeps whatever state it last had (uploads
/// default to `Active`).
#[derive(Default)]
pub struct MockFileApi {
    state: Mutex<FileApiState>,
    upload_calls: AtomicU32,
    get_calls: AtomicU32,
    list_calls: AtomicU32,
}

impl MockFileApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_states(&self, states: &[FileState]) {
        self.state.lock().unwrap().states.extend(states.iter().copied());
    }

    /// Next `n` submissions fail with a transient error
    pub fn fail_uploads_transiently(&self, n: u32) {
        self.state.lock().unwrap().transient_failures = n;
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.state.lock().unwrap().failing_deletes.insert(name.to_string());
    }

    /// Pretend the provider already holds this file
    pub fn seed_remote(&self, file: RemoteFile) {
        self.state.lock().unwrap().remote.push(file);
    }

    pub fn remote_files(&self) -> Vec<RemoteFile> {
        self.state.lock().unwrap().remote.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileApi for MockFileApi {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload(&self, path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ChatError::TransientUpload("FAILED_PRECONDITION".into()));
        }
        if !path.exists() {
            return Err(ChatError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not staged", path.display()),
            )));
        }

        state.next_id += 1;
        let name = format!("files/mock{}", state.next_id);
        let mut file = remote_file(&name, display_name);
        file.mime_type = mime_type.to_string();
        file.state = state.states.pop_front().unwrap_or(FileState::Active);
        if file.state == FileState::Failed {
            file.error = Some("unsupported encoding".into());
        }

        state.remote.push(file.clone());
        Ok(file)
    }

    async fn get(&self, name: &str) -> ChatResult<RemoteFile> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        let next = state.states.pop_front();
        let file = state
            .remote
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| ChatError::Api {
                provider: "mock",
                status: 404,
                body: format!("{} not found", name),
            })?;
        if let Some(next) = next {
            file.state = next;
            if next == FileState::Failed {
                file.error = Some("unsupported encoding".into());
            }
        }
        Ok(file.clone())
    }

    async fn list(&self) -> ChatResult<Vec<RemoteFile>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().remote.clone())
    }

    async fn delete(&self, name: &str) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(name) {
            return Err(ChatError::Api {
                provider: "mock",
                status: 500,
                body: "delete failed".into(),
            });
        }
        state.remote.retain(|f| f.name != name);
        state.deleted.push(name.to_string());
        Ok(())
    }
}

// ============================================================================
// Chat provider
// ============================================================================

enum Ending {
    Done,
    Error(String),
    Blocked(String),
}

/// Replays fixed fragments and records what it was asked
pub struct MockChatProvider {
    fragments: Vec<String>,
    ending: Ending,
    reject_status: Option<u16>,
    remote_files: bool,
    last_request: Mutex<Option<ChatRequest>>,
    calls: AtomicU32,
}

impl MockChatProvider {
    /// Gemini-shaped provider that streams `fragments` then completes
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            ending: Ending::Done,
            reject_status: None,
            remote_files: true,
            last_request: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Stream the fragments, then fail instead of completing
    pub fn failing_midstream(mut self, message: &str) -> Self {
        self.ending = Ending::Error(message.to_string());
        self
    }

    pub fn blocked(mut self, reason: &str) -> Self {
        self.ending = Ending::Blocked(reason.to_string());
        self
    }

    /// Refuse the request outright with this HTTP status
    pub fn rejecting(mut self, status: u16) -> Self {
        self.reject_status = Some(status);
        self
    }

    /// Behave like a text-only provider that cannot reference uploads
    pub fn without_remote_files(mut self) -> Self {
        self.remote_files = false;
        self
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderAdapter for MockChatProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn role_label(&self, role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn accepts_inline_images(&self) -> bool {
        true
    }

    fn accepts_remote_files(&self) -> bool {
        self.remote_files
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn create_stream(&self, request: ChatRequest) -> ChatResult<mpsc::Receiver<StreamEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        if let Some(status) = self.reject_status {
            return Err(ChatError::Api {
                provider: "mock",
                status,
                body: "quota exceeded".into(),
            });
        }

        let (tx, rx) = mpsc::channel(self.fragments.len() + 1);
        for fragment in &self.fragments {
            let _ = tx.send(StreamEvent::TextDelta(fragment.clone())).await;
        }
        let last = match &self.ending {
            Ending::Done => StreamEvent::Done,
            Ending::Error(message) => StreamEvent::Error(message.clone()),
            Ending::Blocked(reason) => StreamEvent::Blocked(reason.clone()),
        };
        let _ = tx.send(last).await;
        Ok(rx)
    }
}
