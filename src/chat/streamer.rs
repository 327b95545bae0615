//! Incremental reply consumption
//!
//! A [`ReplyStream`] holds the history mutably until the reply is complete,
//! so no new normalization can start while a reply is still in flight.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::content::Turn;
use super::history::ConversationHistory;
use super::provider::{StreamEvent, Usage};
use crate::error::{ChatError, ChatResult};

pub struct ReplyStream<'h> {
    history: &'h mut ConversationHistory,
    rx: mpsc::Receiver<StreamEvent>,
    assembled: String,
    usage: Option<Usage>,
    finished: bool,
}

impl<'h> ReplyStream<'h> {
    pub(crate) fn new(history: &'h mut ConversationHistory, rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            history,
            rx,
            assembled: String::new(),
            usage: None,
            finished: false,
        }
    }

    /// Next text fragment in provider order; `None` once the reply has been
    /// appended to history
    pub async fn next_fragment(&mut self) -> ChatResult<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let event = self.rx.recv().await;
            match event {
                Some(StreamEvent::TextDelta(text)) => {
                    self.assembled.push_str(&text);
                    return Ok(Some(text));
                }
                Some(StreamEvent::Usage(usage)) => self.usage = Some(usage),
                Some(StreamEvent::Done) => {
                    self.complete();
                    return Ok(None);
                }
                Some(StreamEvent::Blocked(reason)) => {
                    self.finished = true;
                    return Err(ChatError::Blocked(reason));
                }
                Some(StreamEvent::Error(message)) => {
                    self.finished = true;
                    return Err(ChatError::Stream(message));
                }
                None => {
                    self.finished = true;
                    return Err(ChatError::Stream("stream closed before completion".into()));
                }
            }
        }
    }

    /// Drain the stream and return the assembled reply
    pub async fn collect(mut self) -> ChatResult<String> {
        while self.next_fragment().await?.is_some() {}
        Ok(self.assembled)
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    fn complete(&mut self) {
        self.finished = true;
        if self.assembled.is_empty() {
            warn!("Provider returned an empty reply; nothing appended");
            return;
        }
        if let Some(usage) = self.usage {
            debug!(
                "Reply complete: {} chars, {} in / {} out tokens",
                self.assembled.len(),
                usage.input_tokens,
                usage.output_tokens
            );
        }
        self.history.append(Turn::assistant_text(self.assembled.clone()));
    }
}
