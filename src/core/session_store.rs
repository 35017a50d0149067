/*
 * Keyed storage for data the session manager hands back on restart. The
 * store is a JSON object of groups, each a map of string keys to string
 * values, kept in `session-state.json` in the configuration directory:
 *
 *   { "Peony": { "documents": "<session>...</session>" } }
 *
 * Saving rewrites the whole file through a temporary file and a rename.
 */
use crate::core::config::{ConfigError, Result};
use crate::core::path_utils;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SESSION_STATE_FILENAME: &str = "session-state.json";
pub const SESSION_GROUP: &str = "Peony";
pub const SESSION_DOCUMENTS_KEY: &str = "documents";

type StateFile = BTreeMap<String, BTreeMap<String, String>>;

pub trait SessionStateStoreOperations: Send + Sync {
    fn save(&self, group: &str, key: &str, data: &str) -> Result<()>;
    fn load(&self, group: &str, key: &str) -> Result<Option<String>>;
}

pub struct CoreSessionStateStore {
    file_path: PathBuf,
}

impl CoreSessionStateStore {
    pub fn new(file_path: PathBuf) -> Self {
        CoreSessionStateStore { file_path }
    }

    pub fn for_app(app_name: &str) -> Result<Self> {
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoProjectDirectory)?;
        Ok(Self::new(config_dir.join(SESSION_STATE_FILENAME)))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn read_all(&self) -> Result<StateFile> {
        match fs::read_to_string(&self.file_path) {
            Ok(contents) if contents.trim().is_empty() => Ok(StateFile::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StateFile::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStateStoreOperations for CoreSessionStateStore {
    fn save(&self, group: &str, key: &str, data: &str) -> Result<()> {
        let mut state = self.read_all().unwrap_or_else(|e| {
            log::warn!(
                "CoreSessionStateStore: Discarding unreadable state file {:?}: {e}",
                self.file_path
            );
            StateFile::new()
        });
        state
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), data.to_string());

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(&state)?)?;
        fs::rename(&tmp_path, &self.file_path)?;
        log::debug!(
            "CoreSessionStateStore: Saved {} byte(s) under {group}/{key} in {:?}.",
            data.len(),
            self.file_path
        );
        Ok(())
    }

    fn load(&self, group: &str, key: &str) -> Result<Option<String>> {
        let mut state = self.read_all()?;
        let value = state.get_mut(group).and_then(|entries| entries.remove(key));
        log::debug!(
            "CoreSessionStateStore: {group}/{key} {} in {:?}.",
            if value.is_some() { "found" } else { "not found" },
            self.file_path
        );
        Ok(value)
    }
}
