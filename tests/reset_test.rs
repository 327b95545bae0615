// tests/reset_test.rs
// Session reset: history, local staging and remote files

use std::sync::Arc;
use std::time::Duration;

use superchat::chat::provider::{ModelParameters, UploadClient};
use superchat::chat::{ChatService, ResetReport, SessionState};
use superchat::core::{Backoff, RetryPolicy};
use superchat::testing::{MockChatProvider, MockFileApi, remote_file};

fn service(api: &Arc<MockFileApi>) -> ChatService {
    let uploader = UploadClient::new(api.clone())
        .with_retry(RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO)))
        .with_poll_interval(Duration::ZERO);
    ChatService::new(
        Arc::new(MockChatProvider::new(&["noted"])),
        ModelParameters::with_defaults("gemini-1.5-pro").unwrap(),
    )
    .with_uploader(uploader)
}

#[tokio::test]
async fn test_reset_deletes_every_registered_file() {
    let api = Arc::new(MockFileApi::new());
    api.seed_remote(remote_file("files/old", "pdf_0a1b.pdf"));
    let chat = service(&api);
    let mut session = SessionState::new().unwrap();

    session.add_upload(vec![5u8; 10], "video/mp4", "clip.mp4").await.unwrap();
    chat.send(&mut session, "Summarize").await.unwrap().collect().await.unwrap();
    session.add_speech(vec![1u8, 2, 3]).await.unwrap();

    let report = chat.reset(&mut session).await;

    assert_eq!(
        report,
        ResetReport {
            turns_cleared: 4,
            staged_released: 1,
            remote_deleted: 2,
            remote_failed: 0,
        }
    );
    assert!(session.history().is_empty());
    assert_eq!(session.attachments().staged_count(), 0);
    assert!(api.remote_files().is_empty());

    let mut deleted = api.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["files/mock1".to_string(), "files/old".to_string()]);
}

#[tokio::test]
async fn test_delete_failures_do_not_stop_reset() {
    let api = Arc::new(MockFileApi::new());
    api.seed_remote(remote_file("files/a", "video_a.mp4"));
    api.seed_remote(remote_file("files/b", "audio_b.wav"));
    api.seed_remote(remote_file("files/c", "pdf_c.pdf"));
    api.fail_delete_of("files/b");
    let chat = service(&api);
    let mut session = SessionState::new().unwrap();
    session.add_text("hello");

    let report = chat.reset(&mut session).await;

    assert_eq!(report.turns_cleared, 1);
    assert_eq!(report.remote_deleted, 2);
    assert_eq!(report.remote_failed, 1);
    assert!(session.history().is_empty());
    assert_eq!(api.remote_files().len(), 1);
}

#[tokio::test]
async fn test_session_usable_after_reset() {
    let api = Arc::new(MockFileApi::new());
    let chat = service(&api);
    let mut session = SessionState::new().unwrap();

    session.add_text("first");
    chat.reset(&mut session).await;

    let reply = chat
        .send(&mut session, "again")
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(reply, "noted");
    assert_eq!(session.history().len(), 2);
}
