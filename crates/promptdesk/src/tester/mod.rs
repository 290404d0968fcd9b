//! Conversational tester.
//!
//! Simulates a chat session against a selected agent for manual QA.
//!
//! ```text
//! Idle ──select_agent──▶ AgentSelected ──submit──▶ AwaitingResponse
//!                              ▲                          │
//!                              └──────── resolve ─────────┘
//! ```
//!
//! [`ConversationTester::submit`] appends the user message synchronously and
//! hands back a [`PendingReply`]; awaiting it and passing the outcome to
//! [`ConversationTester::resolve`] appends exactly one assistant message to
//! the conversation the request came from, even if the user has moved on.
//! While a reply is in flight for the open conversation, sending is disabled.
//!
//! The conversation list is persisted through a [`TranscriptStore`] after
//! every change (last write wins).

mod responder;
mod transcript;

pub use responder::{
    CancelHandle, CancelSignal, CannedResponder, ReplyFuture, ReplyRequest, Responder, cancel_pair,
};
pub use transcript::{
    AgentSnapshot, ChatMessage, ChatRole, Conversation, DEFAULT_TITLE, TITLE_MAX_CHARS,
    TranscriptStore, derive_title,
};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DeskError, Result};
use crate::events::{DeskEvent, EventHandler, NoopHandler};

/// Where the tester is in its send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TesterPhase {
    /// No agent selected.
    Idle,
    /// Ready to send.
    AgentSelected,
    /// The open conversation has a reply in flight.
    AwaitingResponse,
}

/// A reply in flight. Await [`wait`](Self::wait) and hand the outcome to
/// [`ConversationTester::resolve`].
pub struct PendingReply {
    conversation_id: String,
    cancel: CancelHandle,
    future: ReplyFuture,
}

impl PendingReply {
    /// Conversation the reply belongs to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Handle to cancel the reply while it is in flight.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the responder to finish or be cancelled.
    pub async fn wait(self) -> ReplyOutcome {
        ReplyOutcome {
            result: self.future.await,
            conversation_id: self.conversation_id,
        }
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("conversation_id", &self.conversation_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The settled result of a [`PendingReply`].
#[derive(Debug)]
pub struct ReplyOutcome {
    pub conversation_id: String,
    pub result: Result<String>,
}

/// Chat surface for trying an agent before it goes live.
///
/// Conversations are persisted through a [`TranscriptStore`] after every
/// change. At most one reply is pending per conversation, and a reply that
/// arrives after its conversation was deleted is dropped.
///
/// ```no_run
/// # async fn run() -> promptdesk::Result<()> {
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use promptdesk::store::MemoryStore;
/// use promptdesk::tester::{AgentSnapshot, CannedResponder, ConversationTester, TranscriptStore};
///
/// let transcripts = TranscriptStore::new(Arc::new(MemoryStore::new()), "chats");
/// let responder = Arc::new(CannedResponder::new("Olá!", Duration::from_millis(10)));
/// let mut tester = ConversationTester::new(responder, transcripts)?;
/// tester.select_agent(AgentSnapshot {
///     agent_id: "ag-1".into(),
///     agent_name: "Suporte".into(),
///     model: "google/gemini-2.5-flash".into(),
///     prompt_version: None,
///     system_prompt: None,
/// })?;
/// let reply = tester.send("Oi").await?;
/// assert_eq!(reply.map(|m| m.content).as_deref(), Some("Olá!"));
/// # Ok(())
/// # }
/// ```
pub struct ConversationTester {
    responder: Arc<dyn Responder>,
    transcripts: TranscriptStore,
    /// Newest first.
    conversations: Vec<Conversation>,
    agent: Option<AgentSnapshot>,
    active: Option<String>,
    pending: HashMap<String, CancelHandle>,
    events: Arc<dyn EventHandler>,
}

impl ConversationTester {
    /// Create a tester, loading stored conversations once.
    pub fn new(responder: Arc<dyn Responder>, transcripts: TranscriptStore) -> Result<Self> {
        let conversations = transcripts.load()?;
        Ok(Self {
            responder,
            transcripts,
            conversations,
            agent: None,
            active: None,
            pending: HashMap::new(),
            events: Arc::new(NoopHandler),
        })
    }

    /// Route events to `events`.
    pub fn with_event_handler(mut self, events: Arc<dyn EventHandler>) -> Self {
        self.events = events;
        self
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Derived from the selected agent and the open conversation.
    pub fn phase(&self) -> TesterPhase {
        match (&self.agent, &self.active) {
            (None, _) => TesterPhase::Idle,
            (Some(_), Some(id)) if self.pending.contains_key(id) => TesterPhase::AwaitingResponse,
            (Some(_), _) => TesterPhase::AgentSelected,
        }
    }

    pub fn selected_agent(&self) -> Option<&AgentSnapshot> {
        self.agent.as_ref()
    }

    /// All conversations, newest first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversations with `agent_id`, newest first.
    pub fn conversations_for<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> impl Iterator<Item = &'a Conversation> + 'a {
        self.conversations
            .iter()
            .filter(move |c| c.agent.agent_id == agent_id)
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// The open conversation.
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_deref().and_then(|id| self.conversation(id))
    }

    /// Messages of the open conversation.
    pub fn transcript(&self) -> &[ChatMessage] {
        self.active().map(|c| c.messages.as_slice()).unwrap_or(&[])
    }

    /// Whether a reply is in flight for `conversation_id`.
    pub fn is_pending(&self, conversation_id: &str) -> bool {
        self.pending.contains_key(conversation_id)
    }

    /// Whether the send control is enabled for `input`.
    pub fn can_send(&self, input: &str) -> bool {
        self.phase() == TesterPhase::AgentSelected
            && self.active.is_some()
            && !input.trim().is_empty()
    }

    // ── Conversation management ────────────────────────────────────

    /// Select an agent and open a fresh, empty conversation for it.
    pub fn select_agent(&mut self, agent: AgentSnapshot) -> Result<&Conversation> {
        self.agent = Some(agent);
        self.new_conversation()
    }

    /// Open a fresh conversation for the selected agent.
    pub fn new_conversation(&mut self) -> Result<&Conversation> {
        let agent = self.agent.clone().ok_or(DeskError::NoAgentSelected)?;
        self.discard_empty_active();

        let conversation = Conversation::new(agent);
        self.events.on_event(&DeskEvent::ConversationStarted {
            conversation_id: &conversation.id,
            agent_id: &conversation.agent.agent_id,
        });
        self.active = Some(conversation.id.clone());
        self.conversations.insert(0, conversation);
        self.persist()?;
        Ok(&self.conversations[0])
    }

    /// Reopen a stored conversation; its agent becomes the selected agent.
    pub fn open_conversation(&mut self, id: &str) -> Result<&Conversation> {
        let agent = self
            .conversation(id)
            .map(|c| c.agent.clone())
            .ok_or_else(|| DeskError::not_found("conversation", id))?;
        if self.active.as_deref() != Some(id) {
            self.discard_empty_active();
        }
        self.agent = Some(agent);
        self.active = Some(id.to_string());
        self.persist()?;
        self.conversation(id)
            .ok_or_else(|| DeskError::not_found("conversation", id))
    }

    /// Delete a conversation, cancelling its pending reply. Deleting the open
    /// conversation leaves the selected agent on a fresh one.
    pub fn delete_conversation(&mut self, id: &str) -> Result<()> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return Err(DeskError::not_found("conversation", id));
        }
        if let Some(handle) = self.pending.remove(id) {
            handle.cancel();
        }
        self.events.on_event(&DeskEvent::ConversationDeleted {
            conversation_id: id,
        });

        if self.active.as_deref() == Some(id) {
            self.active = None;
            if self.agent.is_some() {
                self.new_conversation()?;
                return Ok(());
            }
        }
        self.persist()
    }

    // ── Sending ────────────────────────────────────────────────────

    /// Append the user message to the open conversation and start a reply.
    pub fn submit(&mut self, input: &str) -> Result<PendingReply> {
        let agent = self.agent.clone().ok_or(DeskError::NoAgentSelected)?;
        let id = self.active.clone().ok_or(DeskError::NoAgentSelected)?;
        if self.pending.contains_key(&id) {
            return Err(DeskError::ReplyPending(id));
        }
        let query = input.trim();
        if query.is_empty() {
            return Err(DeskError::Invalid("message is empty".into()));
        }

        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DeskError::not_found("conversation", &id))?;
        let history = conversation.messages.clone();
        conversation.push(ChatMessage::user(query));
        self.events.on_event(&DeskEvent::MessageSent {
            conversation_id: &id,
            content: query,
        });
        self.persist()?;

        let (cancel, signal) = cancel_pair();
        let future = self.responder.reply(
            ReplyRequest {
                conversation_id: id.clone(),
                agent,
                history,
                query: query.to_string(),
            },
            signal,
        );
        self.pending.insert(id.clone(), cancel.clone());
        Ok(PendingReply {
            conversation_id: id,
            cancel,
            future,
        })
    }

    /// Settle a reply. On success exactly one assistant message is appended
    /// to the originating conversation; a cancelled reply appends nothing
    /// and returns `Ok(None)`.
    pub fn resolve(&mut self, outcome: ReplyOutcome) -> Result<Option<ChatMessage>> {
        let id = outcome.conversation_id;
        self.pending.remove(&id);
        match outcome.result {
            Ok(text) => {
                let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id)
                else {
                    debug!("Dropping reply for deleted conversation {id}");
                    return Ok(None);
                };
                let message = ChatMessage::assistant(text);
                conversation.push(message.clone());
                self.events.on_event(&DeskEvent::ReplyReceived {
                    conversation_id: &id,
                    content: &message.content,
                });
                self.persist()?;
                Ok(Some(message))
            }
            Err(DeskError::Cancelled) => {
                self.events.on_event(&DeskEvent::ReplyCancelled {
                    conversation_id: &id,
                });
                Ok(None)
            }
            Err(e) => {
                self.events.on_event(&DeskEvent::ReplyFailed {
                    conversation_id: &id,
                    error: &e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Submit, wait and resolve in one call.
    pub async fn send(&mut self, input: &str) -> Result<Option<ChatMessage>> {
        let pending = self.submit(input)?;
        let outcome = pending.wait().await;
        self.resolve(outcome)
    }

    /// Fire the cancel signal of a pending reply. Returns `false` when
    /// nothing was in flight.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.pending.get(conversation_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Drop the open conversation if nothing was ever said in it.
    fn discard_empty_active(&mut self) {
        if let Some(id) = self.active.take()
            && !self.pending.contains_key(&id)
        {
            self.conversations.retain(|c| c.id != id || !c.is_empty());
        }
    }

    fn persist(&self) -> Result<()> {
        self.transcripts.save(&self.conversations)?;
        self.events.on_event(&DeskEvent::TranscriptsSaved {
            conversations: self.conversations.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::time::Duration;

    struct FailingResponder;

    impl Responder for FailingResponder {
        fn reply(&self, _request: ReplyRequest, _cancel: CancelSignal) -> ReplyFuture {
            Box::pin(async { Err(DeskError::Reply("backend down".into())) })
        }
    }

    fn agent(id: &str) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: id.into(),
            agent_name: format!("Agente {id}"),
            model: crate::DEFAULT_MODEL.into(),
            prompt_version: None,
            system_prompt: Some("Você é um assistente.".into()),
        }
    }

    fn tester_with(store: Arc<MemoryStore>, responder: Arc<dyn Responder>) -> ConversationTester {
        let transcripts = TranscriptStore::new(store, crate::TRANSCRIPT_KEY);
        ConversationTester::new(responder, transcripts).unwrap()
    }

    fn canned() -> Arc<dyn Responder> {
        Arc::new(CannedResponder::new("resposta", Duration::from_millis(1500)))
    }

    #[test]
    fn starts_idle_and_cannot_send() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        assert_eq!(tester.phase(), TesterPhase::Idle);
        assert!(!tester.can_send("olá"));
        assert!(matches!(tester.submit("olá"), Err(DeskError::NoAgentSelected)));
        assert!(matches!(tester.new_conversation(), Err(DeskError::NoAgentSelected)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_appends_one_user_then_one_assistant_message() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        tester.select_agent(agent("a")).unwrap();

        let pending = tester.submit("Qual o horário?").unwrap();
        assert_eq!(tester.transcript().len(), 1);
        assert_eq!(tester.transcript()[0].role, ChatRole::User);
        assert_eq!(tester.phase(), TesterPhase::AwaitingResponse);
        assert!(!tester.can_send("outra"));
        assert!(matches!(tester.submit("outra"), Err(DeskError::ReplyPending(_))));

        let outcome = pending.wait().await;
        let reply = tester.resolve(outcome).unwrap().unwrap();
        assert_eq!(reply.content, "resposta");
        assert_eq!(tester.transcript().len(), 2);
        assert_eq!(tester.transcript()[1].role, ChatRole::Assistant);
        assert_eq!(tester.phase(), TesterPhase::AgentSelected);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_is_rejected_without_appending() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        tester.select_agent(agent("a")).unwrap();
        assert!(!tester.can_send("   "));
        assert!(tester.submit("  ").is_err());
        assert!(tester.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_another_agent_yields_an_empty_transcript() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        tester.select_agent(agent("a")).unwrap();
        tester.send("oi").await.unwrap();
        assert_eq!(tester.transcript().len(), 2);

        let conv = tester.select_agent(agent("b")).unwrap();
        assert!(conv.is_empty());
        assert_eq!(conv.title, DEFAULT_TITLE);
        assert!(tester.transcript().is_empty());
        assert_eq!(tester.conversations_for("a").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_lands_in_its_origin_conversation() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        let origin = tester.select_agent(agent("a")).unwrap().id.clone();
        let pending = tester.submit("pergunta").unwrap();

        tester.select_agent(agent("b")).unwrap();
        let reply = tester.resolve(pending.wait().await).unwrap();
        assert!(reply.is_some());

        assert!(tester.transcript().is_empty());
        assert_eq!(tester.conversation(&origin).unwrap().messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reply_appends_nothing() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        let id = tester.select_agent(agent("a")).unwrap().id.clone();
        let pending = tester.submit("pergunta").unwrap();
        assert!(tester.cancel(&id));

        let outcome = pending.wait().await;
        assert!(tester.resolve(outcome).unwrap().is_none());
        assert_eq!(tester.transcript().len(), 1);
        assert_eq!(tester.phase(), TesterPhase::AgentSelected);
        assert!(!tester.cancel(&id));
    }

    #[tokio::test]
    async fn failed_reply_clears_pending_and_surfaces_error() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), Arc::new(FailingResponder));
        tester.select_agent(agent("a")).unwrap();
        assert!(matches!(tester.send("oi").await, Err(DeskError::Reply(_))));
        assert_eq!(tester.transcript().len(), 1);
        assert!(tester.can_send("de novo"));
    }

    #[tokio::test(start_paused = true)]
    async fn transcripts_persist_and_reload() {
        let store = Arc::new(MemoryStore::new());
        let id = {
            let mut tester = tester_with(store.clone(), canned());
            tester.select_agent(agent("a")).unwrap();
            tester.send("Quero trocar um produto").await.unwrap();
            tester.active().unwrap().id.clone()
        };
        assert!(store.get(crate::TRANSCRIPT_KEY).unwrap().is_some());

        let mut tester = tester_with(store, canned());
        assert_eq!(tester.phase(), TesterPhase::Idle);
        let conv = tester.open_conversation(&id).unwrap();
        assert_eq!(conv.title, "Quero trocar um produto");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(tester.selected_agent().unwrap().agent_id, "a");
        assert_eq!(tester.phase(), TesterPhase::AgentSelected);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_open_conversation_starts_a_fresh_one() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        tester.select_agent(agent("a")).unwrap();
        tester.send("oi").await.unwrap();
        let id = tester.active().unwrap().id.clone();

        tester.delete_conversation(&id).unwrap();
        assert!(tester.conversation(&id).is_none());
        let fresh = tester.active().unwrap();
        assert_ne!(fresh.id, id);
        assert!(fresh.is_empty());
        assert!(tester.delete_conversation(&id).is_err());
    }

    #[test]
    fn empty_conversations_do_not_pile_up() {
        let mut tester = tester_with(Arc::new(MemoryStore::new()), canned());
        tester.select_agent(agent("a")).unwrap();
        tester.select_agent(agent("b")).unwrap();
        tester.new_conversation().unwrap();
        assert_eq!(tester.conversations().len(), 1);
    }
}
