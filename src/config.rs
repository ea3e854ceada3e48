//! User settings, stored as YAML separately from the task data.

use crate::error::StorageError;
use crate::filter::SortOption;
use crate::jsonl::JsonlStorage;
use crate::sqlite::SqliteStorage;
use crate::storage::TaskStorage;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "tasklist";
const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Which storage backend holds the tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Jsonl,
    Sqlite,
}

impl Backend {
    /// Open this backend's storage inside `dir`
    pub fn open(self, dir: &Path) -> Result<Arc<dyn TaskStorage>, StorageError> {
        match self {
            Backend::Jsonl => Ok(Arc::new(JsonlStorage::in_dir(dir))),
            Backend::Sqlite => Ok(Arc::new(SqliteStorage::in_dir(dir)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub language: Language,
    pub theme: Theme,
    pub backend: Backend,
    /// Where task data lives; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub default_sort: SortOption,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            theme: Theme::default(),
            backend: Backend::default(),
            data_dir: None,
            debounce_ms: 200,
            default_sort: SortOption::default(),
        }
    }
}

impl Settings {
    /// `<config_dir>/tasklist/settings.yaml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| eyre!("Could not determine config directory"))?;
        Ok(dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Read settings from `path`, falling back to defaults when it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read settings file")?;
        let settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;
        fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    /// Resolved task data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let dir = dirs::data_dir().ok_or_else(|| eyre!("Could not determine data directory"))?;
                Ok(dir.join(APP_DIR))
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Set one setting by name, as given on the command line
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "language" => self.language = parse_value(value)?,
            "theme" => self.theme = parse_value(value)?,
            "backend" => self.backend = parse_value(value)?,
            "default_sort" | "default-sort" => self.default_sort = parse_value(value)?,
            "data_dir" | "data-dir" => self.data_dir = Some(PathBuf::from(value)),
            "debounce_ms" | "debounce-ms" => {
                self.debounce_ms = value
                    .parse()
                    .with_context(|| format!("Invalid debounce value: {}", value))?;
            }
            other => return Err(eyre!("Unknown setting: {}", other)),
        }
        Ok(())
    }
}

fn parse_value<T: clap::ValueEnum>(value: &str) -> Result<T> {
    T::from_str(value, true).map_err(|e| eyre!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("settings.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.debounce(), Duration::from_millis(200));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/settings.yaml");

        let mut settings = Settings::default();
        settings.set("language", "ko").unwrap();
        settings.set("theme", "dark").unwrap();
        settings.set("backend", "sqlite").unwrap();
        settings.set("default-sort", "due-date").unwrap();
        settings.set("debounce_ms", "50").unwrap();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.language, Language::Ko);
        assert_eq!(loaded.default_sort, SortOption::DueDate);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yaml");
        fs::write(&path, "theme: dark\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.language, Language::En);
        assert_eq!(settings.debounce_ms, 200);
    }

    #[test]
    fn test_set_rejects_unknown() {
        let mut settings = Settings::default();
        assert!(settings.set("colour", "red").is_err());
        assert!(settings.set("theme", "neon").is_err());
        assert!(settings.set("debounce_ms", "soon").is_err());
    }

    #[test]
    fn test_explicit_data_dir() {
        let mut settings = Settings::default();
        settings.set("data-dir", "/tmp/tasks").unwrap();
        assert_eq!(settings.data_dir().unwrap(), PathBuf::from("/tmp/tasks"));
    }

    #[test]
    fn test_backend_open() {
        let temp = TempDir::new().unwrap();
        let jsonl = Backend::Jsonl.open(temp.path()).unwrap();
        assert!(jsonl.read_tasks().unwrap().is_empty());
        let sqlite = Backend::Sqlite.open(temp.path()).unwrap();
        assert!(sqlite.read_tasks().unwrap().is_empty());
        assert!(temp.path().join("tasks.db").exists());
    }
}
