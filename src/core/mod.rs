//! Shared primitives used by the providers and the upload client

pub mod retry;
pub mod sse;

pub use retry::{Backoff, BackoffKind, RetryPolicy};
pub use sse::{SseDecoder, SseFrame};
