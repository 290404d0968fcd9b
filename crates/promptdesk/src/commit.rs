//! Version commit flow.
//!
//! Pairs a [`PromptDraft`] with a bump kind and change description. The
//! commit control stays disabled while any required field is empty, and a
//! commit only ever creates a lineage or appends to one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::draft::PromptDraft;
use crate::error::{DeskError, Result};
use crate::registry::{BumpKind, NewVersion, Prompt, PromptVersion, Registry};

/// A field the commit control depends on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Title,
    Text,
    ChangeDescription,
}

impl RequiredField {
    /// Human-readable field name used in validation messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Text => "prompt text",
            Self::ChangeDescription => "change description",
        }
    }

    /// Comma-separated list for messages.
    pub fn join(fields: &[RequiredField]) -> String {
        fields
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the commit creates a lineage or extends one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitMode {
    Create,
    Edit { prompt_id: String },
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Created(Prompt),
    Appended {
        prompt_id: String,
        version: PromptVersion,
    },
}

impl CommitOutcome {
    /// Id of the prompt the commit landed in.
    pub fn prompt_id(&self) -> &str {
        match self {
            Self::Created(p) => &p.id,
            Self::Appended { prompt_id, .. } => prompt_id,
        }
    }
}

/// Commit form state.
#[derive(Debug, Clone)]
pub struct VersionCommit {
    pub mode: CommitMode,
    pub bump: BumpKind,
    /// Change description; required in edit mode only.
    pub notes: String,
}

impl VersionCommit {
    /// Form for committing a draft as a new prompt.
    ///
    /// ```
    /// use promptdesk::commit::VersionCommit;
    /// use promptdesk::draft::{DraftAction, PromptDraft, reduce};
    ///
    /// let commit = VersionCommit::create();
    /// let draft = reduce(PromptDraft::default(), DraftAction::SetTitle("Suporte".into()));
    /// assert!(!commit.can_commit(&draft));
    /// let draft = reduce(draft, DraftAction::SetText("Você é um assistente.".into()));
    /// assert!(commit.can_commit(&draft));
    /// ```
    pub fn create() -> Self {
        Self {
            mode: CommitMode::Create,
            bump: BumpKind::default(),
            notes: String::new(),
        }
    }

    /// Form for appending a version to `prompt_id`. Notes are required.
    pub fn edit(prompt_id: impl Into<String>) -> Self {
        Self {
            mode: CommitMode::Edit {
                prompt_id: prompt_id.into(),
            },
            bump: BumpKind::default(),
            notes: String::new(),
        }
    }

    pub fn with_bump(mut self, bump: BumpKind) -> Self {
        self.bump = bump;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Required fields that are currently empty (whitespace counts as empty).
    pub fn missing_fields(&self, draft: &PromptDraft) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if draft.title.trim().is_empty() {
            missing.push(RequiredField::Title);
        }
        if draft.text.trim().is_empty() {
            missing.push(RequiredField::Text);
        }
        if matches!(self.mode, CommitMode::Edit { .. }) && self.notes.trim().is_empty() {
            missing.push(RequiredField::ChangeDescription);
        }
        missing
    }

    /// True when nothing in [`missing_fields`](Self::missing_fields) is reported.
    pub fn can_commit(&self, draft: &PromptDraft) -> bool {
        self.missing_fields(draft).is_empty()
    }

    /// Commit the draft, consuming it.
    pub fn commit(
        self,
        registry: &dyn Registry,
        draft: PromptDraft,
        author: &str,
    ) -> Result<CommitOutcome> {
        let missing = self.missing_fields(&draft);
        if !missing.is_empty() {
            return Err(DeskError::Incomplete(missing));
        }
        match self.mode {
            CommitMode::Create => {
                let prompt = registry.create_prompt(&draft.title, &draft.text, author)?;
                debug!("Committed new prompt {}", prompt.id);
                Ok(CommitOutcome::Created(prompt))
            }
            CommitMode::Edit { prompt_id } => {
                let version = registry.append_version(
                    &prompt_id,
                    NewVersion {
                        title: Some(draft.title),
                        text: draft.text,
                        bump: self.bump,
                        notes: self.notes.trim().to_string(),
                        author: author.to_string(),
                    },
                )?;
                debug!("Committed {prompt_id} v{}", version.version);
                Ok(CommitOutcome::Appended { prompt_id, version })
            }
        }
    }
}

// ── SaveVersion ────────────────────────────────────────────────────

/// The short save form on the agent details page: bump kind plus release
/// notes, applied to the agent's linked prompt.
#[derive(Debug, Clone, Default)]
pub struct SaveVersion {
    pub bump: BumpKind,
    pub notes: String,
}

impl SaveVersion {
    pub fn can_save(&self) -> bool {
        !self.notes.trim().is_empty()
    }

    /// Append `text` to `prompt_id` and reset the form to its defaults.
    pub fn save(
        &mut self,
        registry: &dyn Registry,
        prompt_id: &str,
        text: &str,
        author: &str,
    ) -> Result<PromptVersion> {
        if !self.can_save() {
            return Err(DeskError::Incomplete(vec![RequiredField::ChangeDescription]));
        }
        if text.trim().is_empty() {
            return Err(DeskError::Incomplete(vec![RequiredField::Text]));
        }
        let version = registry.append_version(
            prompt_id,
            NewVersion {
                title: None,
                text: text.to_string(),
                bump: self.bump,
                notes: self.notes.trim().to_string(),
                author: author.to_string(),
            },
        )?;
        *self = Self::default();
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{DraftAction, reduce};
    use crate::registry::{MemoryRegistry, SemVer};

    fn draft(title: &str, text: &str) -> PromptDraft {
        let d = reduce(PromptDraft::default(), DraftAction::SetTitle(title.into()));
        reduce(d, DraftAction::SetText(text.into()))
    }

    #[test]
    fn create_mode_requires_title_and_text_only() {
        let form = VersionCommit::create();
        assert_eq!(
            form.missing_fields(&draft("", "")),
            vec![RequiredField::Title, RequiredField::Text]
        );
        assert!(form.can_commit(&draft("Vendas", "texto")));
    }

    #[test]
    fn edit_mode_also_requires_change_description() {
        let form = VersionCommit::edit("pr-1");
        let d = draft("Vendas", "texto");
        assert_eq!(form.missing_fields(&d), vec![RequiredField::ChangeDescription]);
        let form = form.with_notes("   ");
        assert!(!form.can_commit(&d));
        let form = form.with_notes("Ajustes de tom");
        assert!(form.can_commit(&d));
    }

    #[test]
    fn enablement_flips_when_last_field_fills() {
        let form = VersionCommit::edit("pr-1").with_notes("n");
        let mut d = draft("Vendas", "");
        assert!(!form.can_commit(&d));
        d = reduce(d, DraftAction::SetText("t".into()));
        assert!(form.can_commit(&d));
        d = reduce(d, DraftAction::SetTitle(String::new()));
        assert!(!form.can_commit(&d));
    }

    #[test]
    fn incomplete_commit_is_refused_without_side_effects() {
        let registry = MemoryRegistry::new();
        let err = VersionCommit::create()
            .commit(&registry, draft("", "x"), "Ana")
            .unwrap_err();
        assert!(matches!(err, DeskError::Incomplete(ref f) if f == &[RequiredField::Title]));
        assert!(registry.prompts().unwrap().is_empty());
    }

    #[test]
    fn edit_commit_appends_with_default_minor_bump() {
        let registry = MemoryRegistry::new();
        let created = VersionCommit::create()
            .commit(&registry, draft("Vendas", "v1"), "Ana")
            .unwrap();
        let id = created.prompt_id().to_string();

        let outcome = VersionCommit::edit(&id)
            .with_notes("Novas instruções")
            .commit(&registry, draft("Vendas 2", "v2"), "Ana")
            .unwrap();
        let CommitOutcome::Appended { version, .. } = outcome else {
            panic!("expected an appended version");
        };
        assert_eq!(version.version, SemVer::new(1, 1, 0));
        assert_eq!(version.bump, BumpKind::Minor);

        let prompt = registry.prompt(&id).unwrap();
        assert_eq!(prompt.title, "Vendas 2");
        assert_eq!(prompt.version(SemVer::INITIAL).unwrap().text, "v1");
    }

    #[test]
    fn save_version_resets_form_after_success() {
        let registry = MemoryRegistry::new();
        let prompt = registry.create_prompt("Suporte", "v1", "Ana").unwrap();
        let mut form = SaveVersion {
            bump: BumpKind::Major,
            notes: String::new(),
        };
        assert!(form.save(&registry, &prompt.id, "v2", "Ana").is_err());

        form.notes = "Reformulação completa".into();
        let v = form.save(&registry, &prompt.id, "v2", "Ana").unwrap();
        assert_eq!(v.version, SemVer::new(2, 0, 0));
        assert_eq!(form.bump, BumpKind::Minor);
        assert!(form.notes.is_empty());
    }
}
