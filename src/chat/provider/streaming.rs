//! HTTP plumbing shared by the streaming providers

use futures::StreamExt;
use reqwest::Response;
use tokio::sync::mpsc;

use super::StreamEvent;
use crate::core::{SseDecoder, SseFrame};
use crate::error::{ChatError, ChatResult};

/// What a provider decided for one SSE frame
pub(super) enum FrameAction {
    Emit(Vec<StreamEvent>),
    /// Provider signalled the end of the stream (e.g. `[DONE]`)
    Finish,
}

/// Turn a non-2xx response into [`ChatError::Api`]
pub(super) async fn ensure_success(provider: &'static str, response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// Drive an SSE body to completion, forwarding decoded events
///
/// Exactly one terminal event (`Done`, `Error` or `Blocked`) is sent unless
/// the receiver goes away first.
pub(super) async fn pump_sse<F>(response: Response, tx: mpsc::Sender<StreamEvent>, mut handle: F)
where
    F: FnMut(&SseFrame) -> ChatResult<FrameAction>,
{
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        };
        for frame in decoder.push(&bytes) {
            if !dispatch(&tx, &mut handle, &frame).await {
                return;
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        if !dispatch(&tx, &mut handle, &frame).await {
            return;
        }
    }

    let _ = tx.send(StreamEvent::Done).await;
}

/// Returns false once the stream is over
async fn dispatch<F>(tx: &mpsc::Sender<StreamEvent>, handle: &mut F, frame: &SseFrame) -> bool
where
    F: FnMut(&SseFrame) -> ChatResult<FrameAction>,
{
    match handle(frame) {
        Ok(FrameAction::Emit(events)) => {
            for event in events {
                let terminal = matches!(event, StreamEvent::Error(_) | StreamEvent::Blocked(_));
                if tx.send(event).await.is_err() || terminal {
                    return false;
                }
            }
            true
        }
        Ok(FrameAction::Finish) => {
            let _ = tx.send(StreamEvent::Done).await;
            false
        }
        Err(e) => {
            tracing::warn!("Dropping stream after bad frame: {}", e);
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            false
        }
    }
}
