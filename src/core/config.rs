/*
 * User preferences that influence the places list and window handling:
 * automounting of inserted media, whether folders always open in browser
 * windows, hidden files, quitting with the last window and drawing the
 * desktop. They are stored as JSON (`preferences.json`) in the application's
 * configuration directory; a missing file or missing keys mean defaults.
 *
 * As elsewhere, callers only see the `ConfigManagerOperations` trait so that
 * tests can substitute an in-memory implementation.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

const PREFERENCES_FILENAME: &str = "preferences.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NoProjectDirectory,
    Json(serde_json::Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine project directory for configuration")
            }
            ConfigError::Json(e) => write!(f, "Preferences file is not valid JSON: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::NoProjectDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Preferences {
    pub automount_on_insert: bool,
    pub always_use_browser: bool,
    pub show_hidden_files: bool,
    pub exit_with_last_window: bool,
    pub show_desktop: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            automount_on_insert: true,
            always_use_browser: true,
            show_hidden_files: false,
            exit_with_last_window: false,
            show_desktop: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKey {
    AutomountOnInsert,
    AlwaysUseBrowser,
    ShowHiddenFiles,
    ExitWithLastWindow,
    ShowDesktop,
}

impl Preferences {
    /// The keys whose values differ between `old` and `new`.
    pub fn changed_keys(old: &Preferences, new: &Preferences) -> Vec<PreferenceKey> {
        [
            (
                PreferenceKey::AutomountOnInsert,
                old.automount_on_insert != new.automount_on_insert,
            ),
            (
                PreferenceKey::AlwaysUseBrowser,
                old.always_use_browser != new.always_use_browser,
            ),
            (
                PreferenceKey::ShowHiddenFiles,
                old.show_hidden_files != new.show_hidden_files,
            ),
            (
                PreferenceKey::ExitWithLastWindow,
                old.exit_with_last_window != new.exit_with_last_window,
            ),
            (PreferenceKey::ShowDesktop, old.show_desktop != new.show_desktop),
        ]
        .into_iter()
        .filter_map(|(key, changed)| changed.then_some(key))
        .collect()
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_preferences(&self, app_name: &str) -> Result<Preferences>;
    fn save_preferences(&self, app_name: &str, preferences: &Preferences) -> Result<()>;
}

pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    /// Keeps all files in `config_dir` instead of the per-user location.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(config_dir),
        }
    }

    fn config_dir(&self, app_name: &str) -> Result<PathBuf> {
        match &self.config_dir_override {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoProjectDirectory),
        }
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_preferences(&self, app_name: &str) -> Result<Preferences> {
        log::trace!("CoreConfigManager: Loading preferences for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(PREFERENCES_FILENAME);

        let contents = match fs::read_to_string(&file_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("CoreConfigManager: Preferences file {file_path:?} does not exist, using defaults.");
                return Ok(Preferences::default());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            log::debug!("CoreConfigManager: Preferences file {file_path:?} is empty.");
            return Ok(Preferences::default());
        }
        let preferences: Preferences = serde_json::from_str(&contents)?;
        log::debug!("CoreConfigManager: Loaded {preferences:?} from {file_path:?}.");
        Ok(preferences)
    }

    fn save_preferences(&self, app_name: &str, preferences: &Preferences) -> Result<()> {
        let file_path = self.config_dir(app_name)?.join(PREFERENCES_FILENAME);
        let json = serde_json::to_string_pretty(preferences)?;
        fs::write(&file_path, json)?;
        log::debug!("CoreConfigManager: Saved preferences to {file_path:?}.");
        Ok(())
    }
}
