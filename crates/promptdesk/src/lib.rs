//! Agent configuration desk: versioned system prompts, a draft composer and
//! a conversational tester.
//!
//! `promptdesk` manages AI agent configurations. An [`Agent`](registry::Agent)
//! pairs a model from the configured catalog with a [`Prompt`](registry::Prompt),
//! and every prompt is an append-only chain of immutable
//! [`PromptVersion`](registry::PromptVersion)s.
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Store agents and prompt lineages:** see the [`Registry`](registry::Registry)
//!   trait, [`MemoryRegistry`](registry::MemoryRegistry) for in-process use and
//!   [`FileRegistry`](registry::FileRegistry) for a JSON snapshot on disk.
//!
//! - **Author a system prompt:** [`PromptDraft`](draft::PromptDraft) is an
//!   immutable value updated through [`reduce`](draft::reduce). The assisted
//!   mode renders structured [`DraftFields`](draft::DraftFields) into the fixed
//!   template in [`draft::template`].
//!
//! - **Commit a version:** [`VersionCommit`](commit::VersionCommit) gates the
//!   commit on required fields and appends through the registry.
//!   [`history`] lists past versions, copies them, and restores them.
//!
//! - **Test an agent in a chat:** [`ConversationTester`](tester::ConversationTester)
//!   drives the `idle → agent-selected → awaiting-response` cycle against a
//!   [`Responder`](tester::Responder) port and persists transcripts through a
//!   [`KeyValueStore`](store::KeyValueStore).
//!
//! - **Observe side effects:** implement [`EventHandler`](events::EventHandler)
//!   or use [`LoggingHandler`](events::LoggingHandler).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Agents, prompts, semantic versions, registry backends |
//! | [`draft`] | Draft value object, reducer, prompt template |
//! | [`commit`] | Required-field gating and version commit |
//! | [`history`] | Version history, clipboard copy, restore |
//! | [`store`] | Pluggable key-value persistence |
//! | [`tester`] | Conversations, transcript store, reply port, tester state machine |
//! | [`desk`] | [`Desk`](desk::Desk) facade tying registry, config and events together |

pub mod commit;
pub mod config;
pub mod desk;
pub mod draft;
pub mod error;
pub mod events;
pub mod history;
pub mod registry;
pub mod store;
pub mod tester;

pub use config::DeskConfig;
pub use desk::Desk;
pub use error::{DeskError, Result};

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

// ── Constants ──────────────────────────────────────────────────────

/// Storage key holding the serialized conversation list.
pub const TRANSCRIPT_KEY: &str = "promptdesk.conversations";

/// Default model for newly created agents.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Models an agent may be configured with, as `(id, label)` pairs.
pub const MODEL_CATALOG: &[(&str, &str)] = &[
    ("google/gemini-2.5-pro", "Google Gemini 2.5 Pro"),
    ("google/gemini-2.5-flash", "Google Gemini 2.5 Flash"),
    ("google/gemini-2.5-flash-lite", "Google Gemini 2.5 Flash Lite"),
    ("openai/gpt-5", "OpenAI GPT-5"),
    ("openai/gpt-5-mini", "OpenAI GPT-5 Mini"),
    ("openai/gpt-5-nano", "OpenAI GPT-5 Nano"),
];

// ── Ids and timestamps ─────────────────────────────────────────────

/// Generate a unique, roughly time-ordered id with the given prefix,
/// e.g. `ag-18c2f3a9b1e-0003`.
pub fn generate_id(prefix: &str) -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter keeps ids distinct within the same clock tick.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{ts:x}-{count:04x}")
}

/// Current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = generate_id("ag");
        let b = generate_id("ag");
        assert!(a.starts_with("ag-"));
        assert_ne!(a, b);
    }

    #[test]
    fn catalog_contains_default_model() {
        assert!(MODEL_CATALOG.iter().any(|(id, _)| *id == DEFAULT_MODEL));
    }
}
