// tests/pipeline_test.rs
// End-to-end chat pipeline with scripted provider and file API
//
// Covers:
// 1. Multi-modal user turns merged into one provider message
// 2. Upload once, reference afterwards
// 3. Speech recordings answered through the fixed prompt
// 4. Failures leave history with the user turn only

use std::sync::Arc;
use std::time::Duration;

use superchat::chat::provider::{FileState, ModelParameters, Part, UploadClient};
use superchat::chat::{ChatService, ContentKind, Role, SPEECH_PROMPT, SessionState};
use superchat::core::{Backoff, RetryPolicy};
use superchat::testing::{MockChatProvider, MockFileApi, docx_bytes, tiny_png};
use superchat::ChatError;

// ============================================================================
// TEST SETUP UTILITIES
// ============================================================================

fn fast_uploader(api: &Arc<MockFileApi>) -> UploadClient {
    UploadClient::new(api.clone())
        .with_retry(RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO)))
        .with_poll_interval(Duration::ZERO)
}

fn gemini_service(provider: &Arc<MockChatProvider>, api: &Arc<MockFileApi>) -> ChatService {
    ChatService::new(
        provider.clone(),
        ModelParameters::new("gemini-1.5-flash", 0.5, 400).unwrap(),
    )
    .with_uploader(fast_uploader(api))
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_mixed_uploads_become_one_user_message() {
    let provider = Arc::new(MockChatProvider::new(&["It is ", "a red square."]));
    let api = Arc::new(MockFileApi::new());
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    session.add_upload(tiny_png(), "image/png", "square.png").await.unwrap();
    session
        .add_upload(docx_bytes(&["Context doc"]), "", "brief.docx")
        .await
        .unwrap();
    session
        .add_upload(b"%PDF-1.4 body".to_vec(), "application/pdf", "paper.pdf")
        .await
        .unwrap();

    let reply = service
        .send(&mut session, "What is in the image?")
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(reply, "It is a red square.");

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages.len(), 1);
    let parts = &request.messages[0].parts;
    assert_eq!(parts.len(), 4);
    assert!(matches!(&parts[0], Part::InlineImage { mime, .. } if mime == "image/png"));
    assert_eq!(parts[1], Part::Text("Context doc".into()));
    assert!(matches!(&parts[2], Part::File(f) if f.mime_type == "application/pdf"));
    assert_eq!(parts[3], Part::Text("What is in the image?".into()));

    assert_eq!(api.upload_calls(), 1);
    assert_eq!(session.attachments().staged_count(), 0);
    assert_eq!(session.history().len(), 5);
}

#[tokio::test]
async fn test_follow_up_reuses_uploaded_video() {
    let provider = Arc::new(MockChatProvider::new(&["ok"]));
    let api = Arc::new(MockFileApi::new());
    api.push_states(&[FileState::Processing, FileState::Active]);
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    session.add_upload(vec![0u8; 64], "video/mp4", "clip.mp4").await.unwrap();
    service.send(&mut session, "Describe it").await.unwrap().collect().await.unwrap();
    service.send(&mut session, "And the ending?").await.unwrap().collect().await.unwrap();

    assert_eq!(api.upload_calls(), 1);

    let request = provider.last_request().unwrap();
    let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec!["user", "model", "user"]);
    assert!(matches!(&request.messages[0].parts[0], Part::File(f) if f.name == "files/mock1"));
}

#[tokio::test]
async fn test_speech_answered_with_fixed_prompt() {
    let provider = Arc::new(MockChatProvider::new(&["Paris."]));
    let api = Arc::new(MockFileApi::new());
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    assert!(session.add_speech(vec![3u8; 32]).await.unwrap());
    service.send(&mut session, "").await.unwrap().collect().await.unwrap();

    let request = provider.last_request().unwrap();
    let parts = &request.messages[0].parts;
    assert!(matches!(&parts[0], Part::File(f) if f.mime_type == "audio/wav"));
    assert_eq!(parts[1], Part::Text(SPEECH_PROMPT.into()));

    // The sentinel is sent but never displayed
    let user_turn = &session.history().all()[1];
    assert_eq!(user_turn.displayable().count(), 0);
    assert!(!session.speech_pending());
}

#[tokio::test]
async fn test_failed_processing_keeps_only_user_turn() {
    let provider = Arc::new(MockChatProvider::new(&["never"]));
    let api = Arc::new(MockFileApi::new());
    api.push_states(&[FileState::Failed]);
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    session.add_upload(vec![1u8; 8], "audio/mpeg", "talk.mp3").await.unwrap();
    let err = service.send(&mut session, "Transcribe").await.err().unwrap();

    assert!(matches!(err, ChatError::ProcessingFailed { .. }));
    assert_eq!(provider.calls(), 0);
    assert_eq!(session.attachments().staged_count(), 0);
    let last = session.history().last().unwrap();
    assert_eq!(last.role, Role::User);
}

#[tokio::test]
async fn test_midstream_failure_appends_no_reply() {
    let provider = Arc::new(MockChatProvider::new(&["Half an "]).failing_midstream("connection reset"));
    let api = Arc::new(MockFileApi::new());
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    let mut reply = service.send(&mut session, "Tell me a story").await.unwrap();
    assert_eq!(reply.next_fragment().await.unwrap().as_deref(), Some("Half an "));
    assert!(matches!(reply.next_fragment().await, Err(ChatError::Stream(_))));
    drop(reply);

    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_text_only_provider_refuses_video() {
    let provider = Arc::new(MockChatProvider::new(&["hi"]).without_remote_files());
    let api = Arc::new(MockFileApi::new());
    let service = gemini_service(&provider, &api);
    let mut session = SessionState::new().unwrap();

    let kind = session.add_upload(vec![0u8; 4], "", "clip.mp4").await.unwrap();
    assert_eq!(kind, ContentKind::Video);

    let err = service.send(&mut session, "What happens?").await.err().unwrap();
    assert!(matches!(
        err,
        ChatError::UnsupportedContent {
            kind: ContentKind::Video,
            ..
        }
    ));
    assert_eq!(api.upload_calls(), 0);
}
