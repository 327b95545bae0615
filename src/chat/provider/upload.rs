//! Upload + poll client over a provider [`FileApi`]
//!
//! Submission is retried on transient failures per [`RetryPolicy`]; the
//! resulting file is then polled until it leaves `PROCESSING`. A `FAILED`
//! state is terminal and never retried here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{FileApi, FileState, RemoteFile};
use crate::chat::content::file_stem;
use crate::core::RetryPolicy;
use crate::error::{ChatError, ChatResult};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

pub struct UploadClient {
    files: Arc<dyn FileApi>,
    retry: RetryPolicy,
    poll_interval: Duration,
    max_wait: Duration,
}

/// Outcome of deleting every remote file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: usize,
    pub failed: usize,
}

impl UploadClient {
    pub fn new(files: Arc<dyn FileApi>) -> Self {
        Self {
            files,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Upload a local file and wait until the provider can use it
    pub async fn upload(&self, path: &Path, mime_type: &str) -> ChatResult<RemoteFile> {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let label = format!("Upload of {}", display_name);
        let submitted = self
            .retry
            .run(&label, || self.files.upload(path, &display_name, mime_type))
            .await?;

        info!(
            "Uploaded {} to {} as {}",
            display_name,
            self.files.name(),
            submitted.name
        );
        self.wait_until_ready(submitted).await
    }

    /// Poll until the file is `ACTIVE`; `FAILED` is fatal
    pub async fn wait_until_ready(&self, mut file: RemoteFile) -> ChatResult<RemoteFile> {
        let started = Instant::now();

        loop {
            match file.state {
                FileState::Active => return Ok(file),
                FileState::Failed => {
                    return Err(ChatError::ProcessingFailed {
                        reason: file.error.unwrap_or_else(|| "FAILED".to_string()),
                        name: file.name,
                    });
                }
                FileState::Processing | FileState::Unspecified => {
                    if started.elapsed() >= self.max_wait {
                        return Err(ChatError::ProcessingTimeout {
                            name: file.name,
                            waited_secs: self.max_wait.as_secs(),
                        });
                    }
                    debug!("{} still processing, polling in {:?}", file.name, self.poll_interval);
                    tokio::time::sleep(self.poll_interval).await;

                    let name = file.name.clone();
                    file = self
                        .retry
                        .run("File status poll", || self.files.get(&name))
                        .await?;
                }
            }
        }
    }

    /// Fresh snapshot of what the provider currently holds
    pub async fn registry(&self) -> ChatResult<RemoteAttachmentRegistry> {
        let files = self.files.list().await?;
        let registry = RemoteAttachmentRegistry::from_files(files);
        debug!("Remote registry: {} usable files", registry.len());
        Ok(registry)
    }

    /// Best-effort deletion of every remote file; failures are logged
    pub async fn delete_all(&self) -> PurgeReport {
        let mut report = PurgeReport::default();

        let files = match self.files.list().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list remote files for deletion: {}", e);
                return report;
            }
        };

        for file in files {
            match self.files.delete(&file.name).await {
                Ok(()) => {
                    info!("Deleted remote file {}", file.name);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete remote file {}: {}", file.name, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Remote files keyed by display-name stem
///
/// Files in `FAILED` state are left out so their content gets re-uploaded.
#[derive(Debug, Clone, Default)]
pub struct RemoteAttachmentRegistry {
    by_key: HashMap<String, RemoteFile>,
}

impl RemoteAttachmentRegistry {
    pub fn from_files(files: impl IntoIterator<Item = RemoteFile>) -> Self {
        let by_key = files
            .into_iter()
            .filter(|f| f.state != FileState::Failed)
            .map(|f| {
                let key = match &f.display_name {
                    Some(display) => file_stem(display).to_string(),
                    None => file_stem(f.name.trim_start_matches("files/")).to_string(),
                };
                (key, f)
            })
            .collect();
        Self { by_key }
    }

    pub fn lookup(&self, key: &str) -> Option<&RemoteFile> {
        self.by_key.get(file_stem(key))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }
}
