//! In-process registry backend.

use std::sync::{Mutex, MutexGuard};

use super::{
    Agent, AgentStatus, AgentUpdate, NewAgent, NewVersion, Prompt, PromptVersion, Registry,
    RegistryData, SemVer,
};
use crate::error::Result;

/// Registry kept entirely in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    data: Mutex<RegistryData>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing state, e.g. seeded fixtures.
    pub fn with_data(data: RegistryData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RegistryData {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryData> {
        // Mutations validate before writing, so a poisoned lock holds valid state.
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Registry for MemoryRegistry {
    fn create_agent(&self, agent: NewAgent) -> Result<Agent> {
        self.lock().create_agent(agent)
    }

    fn agent(&self, id: &str) -> Result<Agent> {
        self.lock().agent(id).cloned()
    }

    fn agents(&self) -> Result<Vec<Agent>> {
        Ok(self.lock().agents.clone())
    }

    fn update_agent(&self, id: &str, update: AgentUpdate) -> Result<Agent> {
        self.lock().update_agent(id, update)
    }

    fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<Agent> {
        self.lock().set_agent_status(id, status)
    }

    fn create_prompt(&self, title: &str, text: &str, author: &str) -> Result<Prompt> {
        self.lock().create_prompt(title, text, author)
    }

    fn prompt(&self, id: &str) -> Result<Prompt> {
        self.lock().prompt_ref(id).cloned()
    }

    fn prompts(&self) -> Result<Vec<Prompt>> {
        Ok(self.lock().prompts.clone())
    }

    fn append_version(&self, prompt_id: &str, version: NewVersion) -> Result<PromptVersion> {
        self.lock().append_version(prompt_id, version)
    }

    fn set_current_version(&self, prompt_id: &str, version: SemVer) -> Result<Prompt> {
        self.lock().set_current_version(prompt_id, version)
    }
}
