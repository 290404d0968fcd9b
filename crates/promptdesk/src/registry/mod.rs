//! Agent and prompt registry.
//!
//! The registry holds agent records and prompt lineages. Callers reach it
//! through the [`Registry`] trait so a networked store can replace the
//! bundled backends:
//!
//! - [`MemoryRegistry`] keeps everything in process.
//! - [`FileRegistry`] persists a JSON snapshot after every mutation.
//!
//! Both delegate the bookkeeping to [`RegistryData`], which never edits a
//! stored [`PromptVersion`]: every save appends a new one and moves the
//! prompt's current-version pointer.

mod file;
mod memory;
mod version;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use version::{BumpKind, Prompt, PromptVersion, SemVer};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeskError, Result};
use crate::{generate_id, now};

/// Change notes recorded on the first version of every lineage.
pub const INITIAL_NOTES: &str = "Versão inicial";

// ── Agent ──────────────────────────────────────────────────────────

/// Lifecycle status of an agent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
}

impl AgentStatus {
    /// Active becomes inactive and back.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "● Ativo",
            Self::Inactive => "○ Inativo",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        })
    }
}

/// A named configuration pairing a model with a current system prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    /// Model identifier, e.g. `google/gemini-2.5-flash`.
    pub model: String,
    /// Linked prompt lineage, if any.
    pub prompt_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new agent.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub model: String,
    pub status: AgentStatus,
    pub prompt_id: Option<String>,
}

/// Partial update of an agent; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub model: Option<String>,
    pub prompt_id: Option<String>,
}

/// Fields for a version appended to an existing lineage.
#[derive(Debug, Clone)]
pub struct NewVersion {
    /// Replaces the lineage title when set.
    pub title: Option<String>,
    pub text: String,
    pub bump: BumpKind,
    pub notes: String,
    pub author: String,
}

// ── Registry trait ─────────────────────────────────────────────────

/// Create/read/update access to agents and prompt lineages.
///
/// There is no delete: agents are deactivated, and versions are only ever
/// appended.
pub trait Registry: Send + Sync {
    fn create_agent(&self, agent: NewAgent) -> Result<Agent>;
    fn agent(&self, id: &str) -> Result<Agent>;
    /// All agents in creation order.
    fn agents(&self) -> Result<Vec<Agent>>;
    fn update_agent(&self, id: &str, update: AgentUpdate) -> Result<Agent>;
    fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<Agent>;

    /// Create a lineage whose first version is `1.0.0`.
    fn create_prompt(&self, title: &str, text: &str, author: &str) -> Result<Prompt>;
    fn prompt(&self, id: &str) -> Result<Prompt>;
    fn prompts(&self) -> Result<Vec<Prompt>>;
    /// Append a version bumped from the lineage's highest version and point
    /// the lineage at it.
    fn append_version(&self, prompt_id: &str, version: NewVersion) -> Result<PromptVersion>;
    /// Versions newest first.
    fn list_versions(&self, prompt_id: &str) -> Result<Vec<PromptVersion>> {
        Ok(self.prompt(prompt_id)?.history().cloned().collect())
    }
    /// Move the current-version pointer without creating a version.
    fn set_current_version(&self, prompt_id: &str, version: SemVer) -> Result<Prompt>;
}

// ── RegistryData ───────────────────────────────────────────────────

/// Plain registry state shared by the bundled backends. Serialized as-is
/// by [`FileRegistry`].
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct RegistryData {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

impl RegistryData {
    /// Create an agent. The name is trimmed and must not be empty; a linked
    /// prompt must exist.
    pub fn create_agent(&mut self, new: NewAgent) -> Result<Agent> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(DeskError::Invalid("agent name is empty".into()));
        }
        if let Some(ref pid) = new.prompt_id {
            self.prompt_ref(pid)?;
        }
        let ts = now();
        let agent = Agent {
            id: generate_id("ag"),
            name: name.to_string(),
            status: new.status,
            model: new.model,
            prompt_id: new.prompt_id,
            created_at: ts,
            updated_at: ts,
        };
        debug!("Created agent {} ({})", agent.id, agent.name);
        self.agents.push(agent.clone());
        Ok(agent)
    }

    /// Look up an agent by id.
    pub fn agent(&self, id: &str) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| DeskError::not_found("agent", id))
    }

    fn agent_mut(&mut self, id: &str) -> Result<&mut Agent> {
        self.agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DeskError::not_found("agent", id))
    }

    /// Apply the set fields of `update` and refresh `updated_at`.
    pub fn update_agent(&mut self, id: &str, update: AgentUpdate) -> Result<Agent> {
        if let Some(ref pid) = update.prompt_id {
            self.prompt_ref(pid)?;
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DeskError::Invalid("agent name is empty".into()));
        }
        let agent = self.agent_mut(id)?;
        if let Some(name) = update.name {
            agent.name = name.trim().to_string();
        }
        if let Some(model) = update.model {
            agent.model = model;
        }
        if let Some(pid) = update.prompt_id {
            agent.prompt_id = Some(pid);
        }
        agent.updated_at = now();
        Ok(agent.clone())
    }

    /// Set an agent's status.
    pub fn set_agent_status(&mut self, id: &str, status: AgentStatus) -> Result<Agent> {
        let agent = self.agent_mut(id)?;
        agent.status = status;
        agent.updated_at = now();
        Ok(agent.clone())
    }

    /// Create a prompt whose only version is `1.0.0`.
    pub fn create_prompt(&mut self, title: &str, text: &str, author: &str) -> Result<Prompt> {
        let first = PromptVersion {
            version: SemVer::INITIAL,
            bump: BumpKind::Major,
            notes: INITIAL_NOTES.to_string(),
            text: text.to_string(),
            created_at: now(),
            author: author.to_string(),
        };
        let prompt = Prompt::new(generate_id("pr"), title.trim().to_string(), first);
        debug!("Created prompt {} ({})", prompt.id, prompt.title);
        self.prompts.push(prompt.clone());
        Ok(prompt)
    }

    /// Look up a prompt by id without cloning it.
    pub fn prompt_ref(&self, id: &str) -> Result<&Prompt> {
        self.prompts
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DeskError::not_found("prompt", id))
    }

    fn prompt_mut(&mut self, id: &str) -> Result<&mut Prompt> {
        self.prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DeskError::not_found("prompt", id))
    }

    /// Append a version bumped from the latest one. The current version
    /// pointer moves to it.
    pub fn append_version(&mut self, prompt_id: &str, new: NewVersion) -> Result<PromptVersion> {
        let prompt = self.prompt_mut(prompt_id)?;
        let base = match prompt.latest() {
            Some(latest) => latest.version.bump(new.bump)?,
            None => SemVer::INITIAL,
        };
        let version = PromptVersion {
            version: base,
            bump: new.bump,
            notes: new.notes,
            text: new.text,
            created_at: now(),
            author: new.author,
        };
        if let Some(title) = new.title {
            prompt.title = title.trim().to_string();
        }
        prompt.push(version.clone());
        debug!("Appended {prompt_id} v{}", version.version);
        Ok(version)
    }

    /// Move the current version pointer without adding a version.
    pub fn set_current_version(&mut self, prompt_id: &str, version: SemVer) -> Result<Prompt> {
        let prompt = self.prompt_mut(prompt_id)?;
        if prompt.version(version).is_none() {
            return Err(DeskError::not_found("version", format!("{prompt_id}@{version}")));
        }
        prompt.current_version = version;
        prompt.updated_at = now();
        Ok(prompt.clone())
    }
}
