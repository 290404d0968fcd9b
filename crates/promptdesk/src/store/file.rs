//! Directory-backed store: one file per key.

use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::trace;

use super::KeyValueStore;
use crate::error::{DeskError, Result};

/// Bytes escaped in file names: everything but ASCII alphanumerics, `.` and `-`.
const KEY_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-');

/// Store that keeps each key in its own file under a directory.
///
/// Keys are percent-encoded into file names, so distinct keys always map to
/// distinct files and no key can name a path outside the directory. Writes
/// go to a temp file first and are renamed into place.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| DeskError::io(format!("failed to create {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    /// Directory holding the value files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = utf8_percent_encode(key, KEY_ESCAPES);
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeskError::io(format!("failed to read {}", path.display()), e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, value)
            .map_err(|e| DeskError::io(format!("failed to write {}", tmp_path.display()), e))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| DeskError::io(format!("failed to rename {}", path.display()), e))?;
        trace!("Stored {} bytes under '{key}'", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeskError::io(format!("failed to remove {}", path.display()), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Namespaced;
    use std::sync::Arc;

    #[test]
    fn values_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path())
            .unwrap()
            .set("promptdesk.conversations", "[]")
            .unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert_eq!(
            store.get("promptdesk.conversations").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn missing_key_reads_none_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get("nope").unwrap().is_none());
        store.remove("nope").unwrap();
    }

    #[test]
    fn unsafe_key_characters_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("../escape/key", "x").unwrap();
        assert!(dir.path().join("..%2Fescape%2Fkey.json").exists());
        assert_eq!(store.get("../escape/key").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn keys_differing_only_in_punctuation_stay_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("a_b", "raw").unwrap();
        store.set("a:b", "colon").unwrap();
        store.set("a%3Ab", "escaped").unwrap();
        assert_eq!(store.get("a_b").unwrap().as_deref(), Some("raw"));
        assert_eq!(store.get("a:b").unwrap().as_deref(), Some("colon"));
        assert_eq!(store.get("a%3Ab").unwrap().as_deref(), Some("escaped"));
    }

    #[test]
    fn namespaces_do_not_leak_into_raw_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()).unwrap());
        store.set("team_chats", "unrelated").unwrap();

        let team = Namespaced::new(store.clone(), "team");
        assert!(team.get("chats").unwrap().is_none());
        team.set("chats", "[]").unwrap();
        assert_eq!(store.get("team_chats").unwrap().as_deref(), Some("unrelated"));
        assert_eq!(store.get("team:chats").unwrap().as_deref(), Some("[]"));
    }
}
