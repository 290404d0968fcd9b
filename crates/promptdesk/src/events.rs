//! Events and handlers for desk side effects.
//!
//! Every registry mutation and tester transition made through the
//! [`Desk`](crate::desk::Desk) or the
//! [`ConversationTester`](crate::tester::ConversationTester) is reported as a
//! [`DeskEvent`]. Callers implement [`EventHandler`] to observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, warn};

use crate::history::{Notice, NoticeKind};
use crate::registry::{Agent, AgentStatus, BumpKind, Prompt, PromptVersion, SemVer};

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum DeskEvent<'a> {
    AgentCreated(&'a Agent),
    AgentUpdated(&'a Agent),
    AgentStatusChanged {
        agent_id: &'a str,
        status: AgentStatus,
    },
    PromptCreated(&'a Prompt),
    /// A version was appended and the current-version pointer moved.
    VersionCommitted {
        prompt_id: &'a str,
        version: &'a PromptVersion,
    },
    VersionRestored {
        prompt_id: &'a str,
        from: SemVer,
        to: &'a PromptVersion,
    },
    DraftGenerated { chars: usize, refined: bool },
    ConversationStarted {
        conversation_id: &'a str,
        agent_id: &'a str,
    },
    ConversationDeleted { conversation_id: &'a str },
    /// A user message was appended; a reply is now pending.
    MessageSent {
        conversation_id: &'a str,
        content: &'a str,
    },
    ReplyReceived {
        conversation_id: &'a str,
        content: &'a str,
    },
    ReplyCancelled { conversation_id: &'a str },
    ReplyFailed {
        conversation_id: &'a str,
        error: &'a str,
    },
    TranscriptsSaved { conversations: usize },
    /// A transient user-facing notification.
    Notice(&'a Notice),
}

/// Handler for desk events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &DeskEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&DeskEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&DeskEvent<'_>) + Send + Sync,
{
    /// Wrap a closure as a handler.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&DeskEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &DeskEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. Handlers run in insertion order.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler without breaking the builder chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &DeskEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

// ── LoggingHandler ─────────────────────────────────────────────────

/// Logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &DeskEvent<'_>) {
        match event {
            DeskEvent::AgentCreated(agent) => {
                info!(
                    "Agent created: {} '{}' model={} status={}",
                    agent.id, agent.name, agent.model, agent.status
                );
            }
            DeskEvent::AgentUpdated(agent) => {
                info!(
                    "Agent updated: {} model={} prompt={}",
                    agent.id,
                    agent.model,
                    agent.prompt_id.as_deref().unwrap_or("-")
                );
            }
            DeskEvent::AgentStatusChanged { agent_id, status } => {
                info!("Agent {agent_id} is now {status}");
            }
            DeskEvent::PromptCreated(prompt) => {
                info!(
                    "Prompt created: {} '{}' v{}",
                    prompt.id, prompt.title, prompt.current_version
                );
            }
            DeskEvent::VersionCommitted { prompt_id, version } => {
                info!(
                    "Version committed: {prompt_id} v{} ({}) by {}",
                    version.version, version.bump, version.author
                );
                if version.bump == BumpKind::Major {
                    debug!("  notes: {}", version.notes);
                }
            }
            DeskEvent::VersionRestored { prompt_id, from, to } => {
                info!("Restored {prompt_id} v{from} as v{}", to.version);
            }
            DeskEvent::DraftGenerated { chars, refined } => {
                debug!("Draft generated: {chars} chars (refined={refined})");
            }
            DeskEvent::ConversationStarted {
                conversation_id,
                agent_id,
            } => {
                debug!("Conversation {conversation_id} started with {agent_id}");
            }
            DeskEvent::ConversationDeleted { conversation_id } => {
                debug!("Conversation {conversation_id} deleted");
            }
            DeskEvent::MessageSent {
                conversation_id,
                content,
            } => {
                let preview: String = content.chars().take(80).collect();
                debug!("[{conversation_id}] user: {preview}");
            }
            DeskEvent::ReplyReceived {
                conversation_id,
                content,
            } => {
                debug!("[{conversation_id}] reply: {} chars", content.chars().count());
            }
            DeskEvent::ReplyCancelled { conversation_id } => {
                info!("[{conversation_id}] reply cancelled");
            }
            DeskEvent::ReplyFailed {
                conversation_id,
                error,
            } => {
                warn!("[{conversation_id}] reply failed: {error}");
            }
            DeskEvent::TranscriptsSaved { conversations } => {
                debug!("Saved {conversations} conversation(s)");
            }
            DeskEvent::Notice(notice) => match notice.kind {
                NoticeKind::Info => info!("{}: {}", notice.title, notice.description),
                NoticeKind::Destructive => warn!("{}: {}", notice.title, notice.description),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn composite_dispatches_to_every_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let a = count.clone();
        let b = count.clone();
        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            }))
            .with_if(false, NoopHandler)
            .with(FnEventHandler::new(move |_| {
                b.fetch_add(10, Ordering::SeqCst);
            }))
            .with(LoggingHandler);

        handler.on_event(&DeskEvent::ConversationDeleted {
            conversation_id: "cv-1",
        });
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }
}
