//! Conversation transcripts and their persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DeskError, Result};
use crate::registry::SemVer;
use crate::store::KeyValueStore;
use crate::{generate_id, now};

/// Title of a conversation before its first user message.
pub const DEFAULT_TITLE: &str = "Nova conversa";

/// Characters of the first user message kept in a derived title.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: now(),
        }
    }
}

/// The agent configuration a conversation runs against, frozen when the
/// conversation starts so historical prompt versions can be replayed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub agent_name: String,
    pub model: String,
    pub prompt_version: Option<SemVer>,
    pub system_prompt: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub agent: AgentSnapshot,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// An empty conversation with the default title.
    pub fn new(agent: AgentSnapshot) -> Self {
        let ts = now();
        Self {
            id: generate_id("cv"),
            title: DEFAULT_TITLE.to_string(),
            agent,
            messages: Vec::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message. The first user message names the conversation.
    pub fn push(&mut self, message: ChatMessage) {
        if message.role == ChatRole::User && !self.has_user_message() {
            self.title = derive_title(&message.content);
        }
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }

    fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == ChatRole::User)
    }
}

/// Conversation title from its first user message: trimmed, cut to
/// [`TITLE_MAX_CHARS`] characters with `...` appended when cut.
pub fn derive_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head.trim_end())
}

// ── TranscriptStore ────────────────────────────────────────────────

/// Reads and writes the conversation list under one fixed key.
#[derive(Clone)]
pub struct TranscriptStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TranscriptStore {
    /// Store the whole conversation list under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Stored conversations. Unparseable data is logged and read as empty.
    pub fn load(&self) -> Result<Vec<Conversation>> {
        let Some(json) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Conversation>>(&json) {
            Ok(conversations) => {
                debug!("Loaded {} conversation(s)", conversations.len());
                Ok(conversations)
            }
            Err(e) => {
                warn!("Ignoring malformed transcripts under '{}': {e}", self.key);
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the stored list.
    pub fn save(&self, conversations: &[Conversation]) -> Result<()> {
        let json = serde_json::to_string(conversations)
            .map_err(|e| DeskError::json("failed to serialize transcripts", e))?;
        self.store.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn snapshot() -> AgentSnapshot {
        AgentSnapshot {
            agent_id: "ag-1".into(),
            agent_name: "Agente de Suporte".into(),
            model: crate::DEFAULT_MODEL.into(),
            prompt_version: Some(SemVer::new(2, 1, 0)),
            system_prompt: Some("Você é Clara.".into()),
        }
    }

    #[test]
    fn title_comes_from_first_user_message_only() {
        let mut conv = Conversation::new(snapshot());
        assert_eq!(conv.title, DEFAULT_TITLE);
        conv.push(ChatMessage::user("Qual o prazo de entrega?"));
        conv.push(ChatMessage::assistant("Cinco dias."));
        conv.push(ChatMessage::user("E o frete?"));
        assert_eq!(conv.title, "Qual o prazo de entrega?");
    }

    #[test]
    fn long_titles_are_truncated_by_characters() {
        let title = derive_title("Preciso de ajuda com a devolução de um produto que comprei");
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 3);
        assert_eq!(derive_title("   "), DEFAULT_TITLE);
        let accents = "ção".repeat(20);
        assert_eq!(derive_title(&accents).chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn store_roundtrip_and_malformed_data() {
        let backing = Arc::new(MemoryStore::new());
        let store = TranscriptStore::new(backing.clone(), crate::TRANSCRIPT_KEY);
        assert!(store.load().unwrap().is_empty());

        let mut conv = Conversation::new(snapshot());
        conv.push(ChatMessage::user("oi"));
        store.save(std::slice::from_ref(&conv)).unwrap();
        assert_eq!(store.load().unwrap(), vec![conv]);

        backing.set(crate::TRANSCRIPT_KEY, "{broken").unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
