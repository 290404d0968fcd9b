//! Request/response port for assistant replies.
//!
//! A [`Responder`] turns a [`ReplyRequest`] into a boxed future that
//! eventually resolves or fails. Every request carries a [`CancelSignal`];
//! firing the matching [`CancelHandle`] makes a well-behaved responder
//! resolve early with [`DeskError::Cancelled`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::trace;

use super::transcript::{AgentSnapshot, ChatMessage};
use crate::error::{DeskError, Result};

/// Boxed reply future. `'static` so a pending reply can outlive the borrow
/// of the tester that started it.
pub type ReplyFuture = Pin<Box<dyn Future<Output = Result<String>> + Send + 'static>>;

/// Everything a backend needs to answer one user message.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub conversation_id: String,
    pub agent: AgentSnapshot,
    /// Messages before `query`, oldest first.
    pub history: Vec<ChatMessage>,
    pub query: String,
}

/// Inference backend seam.
pub trait Responder: Send + Sync {
    fn reply(&self, request: ReplyRequest, cancel: CancelSignal) -> ReplyFuture;
}

// ── Cancellation ───────────────────────────────────────────────────

/// Create a linked cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal(rx))
}

/// Fires the cancellation of one in-flight request.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    /// Cancel the paired signal. Idempotent.
    pub fn cancel(&self) {
        // Fails only when the request already finished and dropped its signal.
        let _ = self.0.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Observed by the responder serving one request.
#[derive(Clone, Debug)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the handle fires. Pends forever if the handle is
    /// dropped without firing.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ── CannedResponder ────────────────────────────────────────────────

/// Replies with a fixed text after a fixed delay. Stands in for a real model
/// call while preserving the asynchronous contract.
#[derive(Debug, Clone)]
pub struct CannedResponder {
    text: String,
    delay: Duration,
}

impl CannedResponder {
    /// Answer with `text` after `delay`.
    pub fn new(text: impl Into<String>, delay: Duration) -> Self {
        Self {
            text: text.into(),
            delay,
        }
    }
}

impl Responder for CannedResponder {
    fn reply(&self, request: ReplyRequest, mut cancel: CancelSignal) -> ReplyFuture {
        let text = self.text.clone();
        let delay = self.delay;
        Box::pin(async move {
            trace!(
                "Canned reply for {} in {}ms",
                request.conversation_id,
                delay.as_millis()
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(text),
                _ = cancel.cancelled() => Err(DeskError::Cancelled),
            }
        })
    }
}
