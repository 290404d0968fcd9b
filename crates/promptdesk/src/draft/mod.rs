//! Prompt draft composer.
//!
//! A [`PromptDraft`] is an immutable value describing an in-progress system
//! prompt. Every user interaction is a [`DraftAction`], and [`reduce`] maps
//! `(draft, action)` to the next draft, so the templating rules are testable
//! without any rendering layer.
//!
//! ```
//! use promptdesk::draft::{reduce, DraftAction, DraftField, PromptDraft};
//!
//! let draft = [
//!     DraftAction::SetField(DraftField::Name, "Clara".into()),
//!     DraftAction::SetField(DraftField::Role, "assistente de vendas".into()),
//!     DraftAction::Generate,
//! ]
//! .into_iter()
//! .fold(PromptDraft::default(), reduce);
//!
//! assert!(draft.text.starts_with("Você é Clara, assistente de vendas."));
//! assert!(draft.is_generated);
//! ```

pub mod template;

pub use template::{DraftFields, Tone};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeskError;

/// Which authoring tab is active. Both share the same draft text.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DraftMode {
    #[default]
    Manual,
    Assisted,
}

/// One of the structured assistant fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Role,
    Audience,
    Objective,
    Tone,
    Forbidden,
}

impl DraftField {
    /// Form label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Nome do Agente",
            Self::Role => "Função / Papel do Agente",
            Self::Audience => "Público-alvo",
            Self::Objective => "Objetivo Principal",
            Self::Tone => "Tom de Voz",
            Self::Forbidden => "Padrões Proibidos",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DraftField {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "role" => Ok(Self::Role),
            "audience" => Ok(Self::Audience),
            "objective" => Ok(Self::Objective),
            "tone" => Ok(Self::Tone),
            "forbidden" => Ok(Self::Forbidden),
            other => Err(DeskError::Invalid(format!("unknown draft field '{other}'"))),
        }
    }
}

/// A user interaction with the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftAction {
    SetTitle(String),
    /// Manual edit of the prompt text (either tab).
    SetText(String),
    SetField(DraftField, String),
    SetRefinement(String),
    SetMode(DraftMode),
    /// Render the template; appends the refinement block once a base exists.
    Generate,
    /// Clear fields, refinement and text. The title is kept.
    StartOver,
    /// Preload an existing version for editing.
    Load { title: String, text: String },
}

/// In-progress system prompt. Never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDraft {
    pub title: String,
    pub text: String,
    pub fields: DraftFields,
    pub refinement: String,
    pub mode: DraftMode,
    /// Set by the first `Generate`; gates the refinement block.
    pub is_generated: bool,
}

impl PromptDraft {
    /// Draft preloaded with an existing prompt.
    pub fn editing(title: impl Into<String>, text: impl Into<String>) -> Self {
        reduce(
            Self::default(),
            DraftAction::Load {
                title: title.into(),
                text: text.into(),
            },
        )
    }

    /// Current value of a template field.
    pub fn field(&self, field: DraftField) -> &str {
        let f = &self.fields;
        match field {
            DraftField::Name => &f.name,
            DraftField::Role => &f.role,
            DraftField::Audience => &f.audience,
            DraftField::Objective => &f.objective,
            DraftField::Tone => &f.tone,
            DraftField::Forbidden => &f.forbidden,
        }
    }

    fn field_mut(&mut self, field: DraftField) -> &mut String {
        let f = &mut self.fields;
        match field {
            DraftField::Name => &mut f.name,
            DraftField::Role => &mut f.role,
            DraftField::Audience => &mut f.audience,
            DraftField::Objective => &mut f.objective,
            DraftField::Tone => &mut f.tone,
            DraftField::Forbidden => &mut f.forbidden,
        }
    }

    /// The generate button needs at least a persona name and a role.
    pub fn can_generate(&self) -> bool {
        !self.fields.name.is_empty() && !self.fields.role.is_empty()
    }

    /// The refine button needs a generated base and refinement text.
    pub fn can_refine(&self) -> bool {
        self.is_generated && !self.refinement.is_empty()
    }
}

/// Apply one action to a draft.
pub fn reduce(mut draft: PromptDraft, action: DraftAction) -> PromptDraft {
    match action {
        DraftAction::SetTitle(title) => draft.title = title,
        DraftAction::SetText(text) => draft.text = text,
        DraftAction::SetField(field, value) => *draft.field_mut(field) = value,
        DraftAction::SetRefinement(text) => draft.refinement = text,
        DraftAction::SetMode(mode) => draft.mode = mode,
        DraftAction::Generate => {
            draft.text = if draft.can_refine() {
                template::render_refined(&draft.fields, &draft.refinement)
            } else {
                template::render(&draft.fields)
            };
            draft.is_generated = true;
        }
        DraftAction::StartOver => {
            draft = PromptDraft {
                title: draft.title,
                mode: draft.mode,
                ..PromptDraft::default()
            };
        }
        DraftAction::Load { title, text } => {
            draft = PromptDraft {
                title,
                text,
                ..PromptDraft::default()
            };
        }
    }
    draft
}
