//! Version history: listing, clipboard copy and restore.
//!
//! Restoring an old version appends a NEW version that clones the old text
//! (bump `patch`). The current-version pointer therefore always names the
//! newest node and the chain stays append-only.

use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DeskError, Result};
use crate::registry::{BumpKind, NewVersion, PromptVersion, Registry, SemVer};

/// One row of the history view.
#[derive(Serialize, Debug, Clone)]
pub struct HistoryEntry {
    pub version: PromptVersion,
    pub is_current: bool,
}

/// History of one prompt lineage, newest first.
#[derive(Serialize, Debug, Clone)]
pub struct VersionHistory {
    pub prompt_id: String,
    pub title: String,
    pub current_version: SemVer,
    pub entries: Vec<HistoryEntry>,
}

impl VersionHistory {
    /// Build the timeline for a prompt, newest version first.
    pub fn load(registry: &dyn Registry, prompt_id: &str) -> Result<Self> {
        let prompt = registry.prompt(prompt_id)?;
        let entries = prompt
            .history()
            .map(|v| HistoryEntry {
                is_current: v.version == prompt.current_version,
                version: v.clone(),
            })
            .collect();
        Ok(Self {
            prompt_id: prompt.id.clone(),
            title: prompt.title.clone(),
            current_version: prompt.current_version,
            entries,
        })
    }

    /// Entry for `version`, if the prompt has it.
    pub fn entry(&self, version: SemVer) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.version.version == version)
    }

    /// The entry marked current.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.is_current)
    }
}

/// Append a copy of `version`'s text as the new current version.
pub fn restore(
    registry: &dyn Registry,
    prompt_id: &str,
    version: SemVer,
    author: &str,
) -> Result<PromptVersion> {
    let prompt = registry.prompt(prompt_id)?;
    let source = prompt
        .version(version)
        .ok_or_else(|| DeskError::not_found("version", format!("{prompt_id}@{version}")))?;
    let restored = registry.append_version(
        prompt_id,
        NewVersion {
            title: None,
            text: source.text.clone(),
            bump: BumpKind::Patch,
            notes: restore_notes(version),
            author: author.to_string(),
        },
    )?;
    debug!("Restored {prompt_id} v{version} as v{}", restored.version);
    Ok(restored)
}

/// Change description recorded when `version` is restored.
pub fn restore_notes(version: SemVer) -> String {
    format!("Restaurado da versão {version}")
}

// ── Clipboard and notices ──────────────────────────────────────────

/// Severity of a transient notification.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Destructive,
}

/// A transient, user-facing notification (a toast).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    /// A plain confirmation.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    /// A failure or warning notice.
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Destructive,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// System clipboard seam.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Clipboard that keeps the last written text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last copied text.
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        Ok(())
    }
}

/// Copy a version's prompt text. Failures never propagate: they become a
/// destructive notice.
pub fn copy_prompt(clipboard: &dyn Clipboard, version: &PromptVersion) -> Notice {
    match clipboard.write_text(&version.text) {
        Ok(()) => Notice::info(
            "Copiado!",
            format!(
                "Prompt da versão {} copiado para a área de transferência.",
                version.version
            ),
        ),
        Err(e) => {
            warn!("Clipboard copy failed: {e}");
            Notice::destructive("Erro", "Não foi possível copiar o prompt.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    struct BrokenClipboard;

    impl Clipboard for BrokenClipboard {
        fn write_text(&self, _text: &str) -> Result<()> {
            Err(DeskError::Clipboard("permission denied".into()))
        }
    }

    fn seeded() -> (MemoryRegistry, String) {
        let registry = MemoryRegistry::new();
        let prompt = registry
            .create_prompt("Atendimento", "Você é um assistente virtual...", "João Silva")
            .unwrap();
        registry
            .append_version(
                &prompt.id,
                NewVersion {
                    title: None,
                    text: "Você é Clara, assistente de atendimento ao cliente...".into(),
                    bump: BumpKind::Major,
                    notes: "Reformulação completa do tom de voz".into(),
                    author: "Maria Santos".into(),
                },
            )
            .unwrap();
        (registry, prompt.id)
    }

    #[test]
    fn history_marks_only_the_current_version() {
        let (registry, id) = seeded();
        let history = VersionHistory::load(&registry, &id).unwrap();
        assert_eq!(history.entries.len(), 2);
        assert!(history.entries[0].is_current);
        assert!(!history.entries[1].is_current);
        assert_eq!(history.current().unwrap().version.version, SemVer::new(2, 0, 0));
    }

    #[test]
    fn restore_appends_a_clone_instead_of_rewinding() {
        let (registry, id) = seeded();
        let restored = restore(&registry, &id, SemVer::INITIAL, "Pedro Costa").unwrap();

        assert_eq!(restored.version, SemVer::new(2, 0, 1));
        assert_eq!(restored.text, "Você é um assistente virtual...");
        assert_eq!(restored.notes, "Restaurado da versão 1.0.0");

        let history = VersionHistory::load(&registry, &id).unwrap();
        assert_eq!(history.entries.len(), 3);
        assert_eq!(history.current_version, restored.version);
    }

    #[test]
    fn restore_unknown_version_fails() {
        let (registry, id) = seeded();
        assert!(restore(&registry, &id, SemVer::new(7, 0, 0), "x").is_err());
    }

    #[test]
    fn copy_reports_success_and_failure_as_notices() {
        let (registry, id) = seeded();
        let history = VersionHistory::load(&registry, &id).unwrap();
        let entry = &history.entries[0].version;

        let clipboard = MemoryClipboard::new();
        let ok = copy_prompt(&clipboard, entry);
        assert_eq!(ok.kind, NoticeKind::Info);
        assert_eq!(clipboard.contents().as_deref(), Some(entry.text.as_str()));

        let failed = copy_prompt(&BrokenClipboard, entry);
        assert_eq!(failed.kind, NoticeKind::Destructive);
    }
}
