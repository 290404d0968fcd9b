//! Desk configuration with sensible defaults.
//!
//! [`DeskConfig`] is built from defaults, optionally overlaid with a JSON
//! file (`promptdesk.json` in the data dir), and finally with command-line
//! flags via the `with_*` builders.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeskError, Result};
use crate::{DEFAULT_MODEL, MODEL_CATALOG, TRANSCRIPT_KEY};

/// File name of the optional config overlay inside the data dir.
pub const CONFIG_FILE: &str = "promptdesk.json";

/// Reply the canned responder gives to every message.
pub const CANNED_REPLY: &str = "Esta é uma resposta simulada do agente de IA. Em produção, esta resposta seria gerada pelo modelo de IA configurado com o prompt selecionado.";

/// An entry in the model catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DeskConfig {
    /// Directory holding the registry snapshot and transcripts. Default: `.promptdesk`.
    pub data_dir: PathBuf,
    /// Author recorded on committed versions. Default: `$USER`, else `"anonymous"`.
    pub author: String,
    /// Simulated reply latency in milliseconds. Default: `1500`.
    pub reply_delay_ms: u64,
    /// Text of the canned reply.
    pub canned_reply: String,
    /// Storage key for the conversation list.
    pub transcript_key: String,
    /// Models agents may use.
    pub models: Vec<ModelOption>,
    /// Model preselected for new agents.
    pub default_model: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".promptdesk"),
            author: std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string()),
            reply_delay_ms: 1500,
            canned_reply: CANNED_REPLY.to_string(),
            transcript_key: TRANSCRIPT_KEY.to_string(),
            models: MODEL_CATALOG
                .iter()
                .map(|(id, label)| ModelOption {
                    id: id.to_string(),
                    label: label.to_string(),
                })
                .collect(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl DeskConfig {
    /// Load the overlay file if present. Keys missing from the file keep
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| DeskError::io(format!("failed to read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| DeskError::json(format!("failed to parse {}", path.display()), e))?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Override the author recorded on new versions.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Override the canned reply delay.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Whether `id` is in the model catalog.
    pub fn is_known_model(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    /// Directory for transcript storage.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir.join("transcripts")
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(DeskError::Invalid("model catalog is empty".into()));
        }
        if !self.is_known_model(&self.default_model) {
            return Err(DeskError::UnknownModel(self.default_model.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_catalog() {
        let config = DeskConfig::default();
        assert_eq!(config.models.len(), MODEL_CATALOG.len());
        assert!(config.is_known_model(&config.default_model));
        assert_eq!(config.reply_delay(), Duration::from_millis(1500));
        assert_eq!(config.transcript_key, TRANSCRIPT_KEY);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"reply_delay_ms": 10, "author": "Maria Santos"}"#).unwrap();

        let config = DeskConfig::load(&path).unwrap();
        assert_eq!(config.reply_delay_ms, 10);
        assert_eq!(config.author, "Maria Santos");
        assert_eq!(config.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn default_model_must_be_in_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"default_model": "acme/unknown"}"#).unwrap();
        assert!(matches!(
            DeskConfig::load(&path),
            Err(DeskError::UnknownModel(_))
        ));
    }

    #[test]
    fn missing_file_is_defaults() {
        let config = DeskConfig::load(Path::new("/nonexistent/promptdesk.json")).unwrap();
        assert_eq!(config.reply_delay_ms, 1500);
    }

    #[test]
    fn builders_override() {
        let config = DeskConfig::default()
            .with_data_dir("/tmp/desk")
            .with_author("Pedro")
            .with_reply_delay(Duration::from_millis(5));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/desk"));
        assert_eq!(config.transcripts_dir(), PathBuf::from("/tmp/desk/transcripts"));
        assert_eq!(config.author, "Pedro");
        assert_eq!(config.reply_delay_ms, 5);
    }
}
