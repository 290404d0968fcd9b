//! JSON snapshot registry backend.
//!
//! The whole registry lives in one `registry.json` inside a data directory.
//! Every mutation rewrites the snapshot atomically (temp file + rename), so a
//! crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use super::{
    Agent, AgentStatus, AgentUpdate, NewAgent, NewVersion, Prompt, PromptVersion, Registry,
    RegistryData, SemVer,
};
use crate::error::{DeskError, Result};

const SNAPSHOT_FILE: &str = "registry.json";

/// Registry persisted as a JSON snapshot.
pub struct FileRegistry {
    path: PathBuf,
    data: Mutex<RegistryData>,
}

impl FileRegistry {
    /// Open the registry in `dir`, creating the directory if needed. A
    /// missing snapshot starts an empty registry.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| DeskError::io(format!("failed to create {}", dir.display()), e))?;
        let path = dir.join(SNAPSHOT_FILE);

        let data = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| DeskError::io("failed to read registry snapshot", e))?;
            let data: RegistryData = serde_json::from_str(&json)
                .map_err(|e| DeskError::json("failed to parse registry snapshot", e))?;
            info!(
                "Loaded registry from {} ({} agents, {} prompts)",
                path.display(),
                data.agents.len(),
                data.prompts.len()
            );
            data
        } else {
            debug!("No registry snapshot at {}, starting empty", path.display());
            RegistryData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, RegistryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a mutation on a copy, persist it, then publish it. A failed
    /// mutation or a failed write leaves both memory and disk unchanged.
    fn mutate<T>(&self, f: impl FnOnce(&mut RegistryData) -> Result<T>) -> Result<T> {
        let mut data = self.lock();
        let mut next = data.clone();
        let out = f(&mut next)?;
        self.save(&next)?;
        *data = next;
        Ok(out)
    }

    fn save(&self, data: &RegistryData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| DeskError::json("failed to serialize registry", e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| DeskError::io("failed to write temp registry snapshot", e))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| DeskError::io("failed to rename registry snapshot", e))?;
        Ok(())
    }
}

impl Registry for FileRegistry {
    fn create_agent(&self, agent: NewAgent) -> Result<Agent> {
        self.mutate(|d| d.create_agent(agent))
    }

    fn agent(&self, id: &str) -> Result<Agent> {
        self.lock().agent(id).cloned()
    }

    fn agents(&self) -> Result<Vec<Agent>> {
        Ok(self.lock().agents.clone())
    }

    fn update_agent(&self, id: &str, update: AgentUpdate) -> Result<Agent> {
        self.mutate(|d| d.update_agent(id, update))
    }

    fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<Agent> {
        self.mutate(|d| d.set_agent_status(id, status))
    }

    fn create_prompt(&self, title: &str, text: &str, author: &str) -> Result<Prompt> {
        self.mutate(|d| d.create_prompt(title, text, author))
    }

    fn prompt(&self, id: &str) -> Result<Prompt> {
        self.lock().prompt_ref(id).cloned()
    }

    fn prompts(&self) -> Result<Vec<Prompt>> {
        Ok(self.lock().prompts.clone())
    }

    fn append_version(&self, prompt_id: &str, version: NewVersion) -> Result<PromptVersion> {
        self.mutate(|d| d.append_version(prompt_id, version))
    }

    fn set_current_version(&self, prompt_id: &str, version: SemVer) -> Result<Prompt> {
        self.mutate(|d| d.set_current_version(prompt_id, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BumpKind;

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_id = {
            let registry = FileRegistry::open(dir.path()).unwrap();
            let prompt = registry.create_prompt("Suporte", "Você é Clara.", "João").unwrap();
            registry
                .append_version(
                    &prompt.id,
                    NewVersion {
                        title: Some("Suporte v2".into()),
                        text: "Você é Clara, empática.".into(),
                        bump: BumpKind::Minor,
                        notes: "Mais empatia".into(),
                        author: "João".into(),
                    },
                )
                .unwrap();
            prompt.id
        };

        let reopened = FileRegistry::open(dir.path()).unwrap();
        let prompt = reopened.prompt(&prompt_id).unwrap();
        assert_eq!(prompt.title, "Suporte v2");
        assert_eq!(prompt.current_version, SemVer::new(1, 1, 0));
        assert_eq!(prompt.version_count(), 2);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path()).unwrap();
        registry.create_prompt("t", "x", "a").unwrap();
        assert!(registry.path().exists());
        assert!(!dir.path().join("registry.json.tmp").exists());
    }

    #[test]
    fn failed_mutation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path()).unwrap();
        assert!(
            registry
                .set_agent_status("ag-missing", AgentStatus::Inactive)
                .is_err()
        );
        assert!(!registry.path().exists());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path()).unwrap();
        let prompt = registry.create_prompt("Suporte", "Você é Clara.", "João").unwrap();

        // A directory at the temp path makes the snapshot write fail.
        std::fs::create_dir(dir.path().join("registry.json.tmp")).unwrap();
        let appended = registry.append_version(
            &prompt.id,
            NewVersion {
                title: None,
                text: "Você é Clara, empática.".into(),
                bump: BumpKind::Minor,
                notes: "Mais empatia".into(),
                author: "João".into(),
            },
        );
        assert!(matches!(appended, Err(DeskError::Io { .. })));
        assert_eq!(registry.prompt(&prompt.id).unwrap().version_count(), 1);
        assert_eq!(registry.list_versions(&prompt.id).unwrap().len(), 1);

        let on_disk = FileRegistry::open(dir.path()).unwrap();
        assert_eq!(on_disk.prompt(&prompt.id).unwrap().version_count(), 1);

        std::fs::remove_dir(dir.path().join("registry.json.tmp")).unwrap();
        let retried = registry
            .append_version(
                &prompt.id,
                NewVersion {
                    title: None,
                    text: "Você é Clara, empática.".into(),
                    bump: BumpKind::Minor,
                    notes: "Mais empatia".into(),
                    author: "João".into(),
                },
            )
            .unwrap();
        assert_eq!(retried.version, SemVer::new(1, 1, 0));
        assert_eq!(registry.prompt(&prompt.id).unwrap().version_count(), 2);
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("registry.json"), "{not json").unwrap();
        assert!(matches!(
            FileRegistry::open(dir.path()),
            Err(DeskError::Json { .. })
        ));
    }
}
