//! The [`Desk`] facade.
//!
//! Ties a [`Registry`], the [`DeskConfig`] and an [`EventHandler`] together
//! and exposes the operations behind each screen: agent list and details,
//! the prompt composer, version history and the conversational tester.

use std::sync::Arc;

use tracing::debug;

use crate::commit::{CommitOutcome, SaveVersion, VersionCommit};
use crate::config::{DeskConfig, ModelOption};
use crate::draft::{DraftAction, PromptDraft, reduce};
use crate::error::{DeskError, Result};
use crate::events::{DeskEvent, EventHandler, NoopHandler};
use crate::history::{self, Clipboard, Notice, VersionHistory, copy_prompt};
use crate::registry::{
    Agent, AgentStatus, AgentUpdate, NewAgent, Prompt, PromptVersion, Registry, SemVer,
};
use crate::store::KeyValueStore;
use crate::tester::{AgentSnapshot, CannedResponder, ConversationTester, TranscriptStore};

/// The "new agent" form.
#[derive(Debug, Clone)]
pub struct CreateAgentForm {
    pub name: String,
    pub status: AgentStatus,
    pub prompt_id: Option<String>,
    pub model: String,
}

impl CreateAgentForm {
    /// Empty form with the configured default model preselected.
    pub fn new(config: &DeskConfig) -> Self {
        Self {
            name: String::new(),
            status: AgentStatus::Active,
            prompt_id: None,
            model: config.default_model.clone(),
        }
    }

    /// Name, prompt and model are all required.
    pub fn can_save(&self) -> bool {
        !self.name.trim().is_empty()
            && self.prompt_id.as_deref().is_some_and(|p| !p.is_empty())
            && !self.model.is_empty()
    }
}

/// Front door for the agent list, the prompt composer, version history and
/// the tester. Every operation goes through the injected [`Registry`] and
/// reports what it did to the event handler.
///
/// ```
/// use std::sync::Arc;
///
/// use promptdesk::commit::VersionCommit;
/// use promptdesk::draft::{DraftAction, PromptDraft};
/// use promptdesk::registry::MemoryRegistry;
/// use promptdesk::{Desk, DeskConfig};
///
/// let desk = Desk::new(Arc::new(MemoryRegistry::new()), DeskConfig::default());
/// let draft = desk.apply_draft(PromptDraft::default(), DraftAction::SetTitle("Atendimento".into()));
/// let draft = desk.apply_draft(draft, DraftAction::SetText("Você é um assistente.".into()));
/// let outcome = desk.commit(VersionCommit::create(), draft)?;
/// assert_eq!(desk.history(outcome.prompt_id())?.entries.len(), 1);
/// # Ok::<(), promptdesk::DeskError>(())
/// ```
pub struct Desk {
    registry: Arc<dyn Registry>,
    config: DeskConfig,
    events: Arc<dyn EventHandler>,
}

impl Desk {
    /// A desk with no event handler.
    pub fn new(registry: Arc<dyn Registry>, config: DeskConfig) -> Self {
        Self {
            registry,
            config,
            events: Arc::new(NoopHandler),
        }
    }

    /// Route events to `events`.
    pub fn with_event_handler(mut self, events: Arc<dyn EventHandler>) -> Self {
        self.events = events;
        self
    }

    /// The backing registry.
    pub fn registry(&self) -> &dyn Registry {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Models offered in agent forms.
    pub fn models(&self) -> &[ModelOption] {
        &self.config.models
    }

    // ── Agents ─────────────────────────────────────────────────────

    /// Validate and create an agent from the form.
    pub fn create_agent(&self, form: CreateAgentForm) -> Result<Agent> {
        if !form.can_save() {
            return Err(DeskError::Invalid(
                "name, prompt and model are required".into(),
            ));
        }
        self.check_model(&form.model)?;
        let agent = self.registry.create_agent(NewAgent {
            name: form.name.trim().to_string(),
            model: form.model,
            status: form.status,
            prompt_id: form.prompt_id,
        })?;
        self.events.on_event(&DeskEvent::AgentCreated(&agent));
        Ok(agent)
    }

    /// Flip an agent between active and inactive.
    pub fn toggle_agent_status(&self, agent_id: &str) -> Result<Agent> {
        let status = self.registry.agent(agent_id)?.status.toggled();
        let agent = self.registry.set_agent_status(agent_id, status)?;
        self.events.on_event(&DeskEvent::AgentStatusChanged {
            agent_id: &agent.id,
            status: agent.status,
        });
        Ok(agent)
    }

    /// Change an agent's model. The model must be in the catalog.
    pub fn set_agent_model(&self, agent_id: &str, model: &str) -> Result<Agent> {
        self.check_model(model)?;
        self.update_agent(
            agent_id,
            AgentUpdate {
                model: Some(model.to_string()),
                ..AgentUpdate::default()
            },
        )
    }

    /// Link an existing prompt to an agent.
    pub fn link_prompt(&self, agent_id: &str, prompt_id: &str) -> Result<Agent> {
        self.update_agent(
            agent_id,
            AgentUpdate {
                prompt_id: Some(prompt_id.to_string()),
                ..AgentUpdate::default()
            },
        )
    }

    pub fn update_agent(&self, agent_id: &str, update: AgentUpdate) -> Result<Agent> {
        if let Some(model) = &update.model {
            self.check_model(model)?;
        }
        let agent = self.registry.update_agent(agent_id, update)?;
        self.events.on_event(&DeskEvent::AgentUpdated(&agent));
        Ok(agent)
    }

    /// The prompt linked to an agent.
    pub fn agent_prompt(&self, agent_id: &str) -> Result<Prompt> {
        let agent = self.registry.agent(agent_id)?;
        let prompt_id = agent
            .prompt_id
            .ok_or_else(|| DeskError::Invalid(format!("agent {agent_id} has no linked prompt")))?;
        self.registry.prompt(&prompt_id)
    }

    // ── Composer and commits ───────────────────────────────────────

    /// Apply a composer action, reporting generations.
    pub fn apply_draft(&self, draft: PromptDraft, action: DraftAction) -> PromptDraft {
        let generate = action == DraftAction::Generate;
        let refined = generate && draft.can_refine();
        let draft = reduce(draft, action);
        if generate {
            self.events.on_event(&DeskEvent::DraftGenerated {
                chars: draft.text.chars().count(),
                refined,
            });
        }
        draft
    }

    /// Draft preloaded with a prompt's current version.
    pub fn edit_draft(&self, prompt_id: &str) -> Result<PromptDraft> {
        let prompt = self.registry.prompt(prompt_id)?;
        let current = prompt
            .current()
            .ok_or_else(|| DeskError::not_found("version", prompt_id))?;
        Ok(PromptDraft::editing(&prompt.title, &current.text))
    }

    /// Commit a draft as a new prompt or as a version of an existing one.
    pub fn commit(&self, commit: VersionCommit, draft: PromptDraft) -> Result<CommitOutcome> {
        let outcome = commit.commit(self.registry.as_ref(), draft, &self.config.author)?;
        match &outcome {
            CommitOutcome::Created(prompt) => {
                self.events.on_event(&DeskEvent::PromptCreated(prompt));
            }
            CommitOutcome::Appended { prompt_id, version } => {
                self.events
                    .on_event(&DeskEvent::VersionCommitted { prompt_id, version });
            }
        }
        Ok(outcome)
    }

    /// Save `text` as a new version of the agent's linked prompt.
    pub fn save_agent_version(
        &self,
        agent_id: &str,
        form: &mut SaveVersion,
        text: &str,
    ) -> Result<PromptVersion> {
        let prompt = self.agent_prompt(agent_id)?;
        let version = form.save(self.registry.as_ref(), &prompt.id, text, &self.config.author)?;
        self.events.on_event(&DeskEvent::VersionCommitted {
            prompt_id: &prompt.id,
            version: &version,
        });
        Ok(version)
    }

    // ── History ────────────────────────────────────────────────────

    /// Version timeline of a prompt.
    pub fn history(&self, prompt_id: &str) -> Result<VersionHistory> {
        VersionHistory::load(self.registry.as_ref(), prompt_id)
    }

    /// Restore `version` by appending a patch version with its text.
    /// Earlier versions are never rewritten.
    pub fn restore(&self, prompt_id: &str, version: SemVer) -> Result<PromptVersion> {
        let restored = history::restore(
            self.registry.as_ref(),
            prompt_id,
            version,
            &self.config.author,
        )?;
        self.events.on_event(&DeskEvent::VersionRestored {
            prompt_id,
            from: version,
            to: &restored,
        });
        Ok(restored)
    }

    /// Copy a version's text to `clipboard` and return the notice to show.
    /// A clipboard failure is reported through the notice, not as an error.
    pub fn copy_version(
        &self,
        clipboard: &dyn Clipboard,
        prompt_id: &str,
        version: SemVer,
    ) -> Result<Notice> {
        let prompt = self.registry.prompt(prompt_id)?;
        let entry = prompt
            .version(version)
            .ok_or_else(|| DeskError::not_found("version", format!("{prompt_id}@{version}")))?;
        let notice = copy_prompt(clipboard, entry);
        self.events.on_event(&DeskEvent::Notice(&notice));
        Ok(notice)
    }

    // ── Tester ─────────────────────────────────────────────────────

    /// Freeze an agent for a conversation, with a specific prompt version or
    /// the current one.
    pub fn agent_snapshot(&self, agent_id: &str, version: Option<SemVer>) -> Result<AgentSnapshot> {
        let agent = self.registry.agent(agent_id)?;
        let selected = match &agent.prompt_id {
            Some(prompt_id) => {
                let prompt = self.registry.prompt(prompt_id)?;
                let v = version.unwrap_or(prompt.current_version);
                let entry = prompt.version(v).ok_or_else(|| {
                    DeskError::not_found("version", format!("{prompt_id}@{v}"))
                })?;
                Some((entry.version, entry.text.clone()))
            }
            None if version.is_some() => {
                return Err(DeskError::Invalid(format!(
                    "agent {agent_id} has no linked prompt"
                )));
            }
            None => None,
        };
        debug!("Snapshot of {agent_id} with prompt {selected:?}");
        let (prompt_version, system_prompt) = selected.unzip();
        Ok(AgentSnapshot {
            agent_id: agent.id,
            agent_name: agent.name,
            model: agent.model,
            prompt_version,
            system_prompt,
        })
    }

    /// Responder that answers every message with the configured reply.
    pub fn canned_responder(&self) -> CannedResponder {
        CannedResponder::new(self.config.canned_reply.clone(), self.config.reply_delay())
    }

    /// A tester wired to the canned responder, persisting to `store`.
    pub fn tester(&self, store: Arc<dyn KeyValueStore>) -> Result<ConversationTester> {
        let transcripts = TranscriptStore::new(store, self.config.transcript_key.clone());
        Ok(
            ConversationTester::new(Arc::new(self.canned_responder()), transcripts)?
                .with_event_handler(self.events.clone()),
        )
    }

    fn check_model(&self, model: &str) -> Result<()> {
        if self.config.is_known_model(model) {
            Ok(())
        } else {
            Err(DeskError::UnknownModel(model.to_string()))
        }
    }
}
