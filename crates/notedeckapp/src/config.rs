use crate::error::{NoteError, Result};
use crate::model::Mode;
use crate::store::remote::{DEFAULT_API_BASE, DEFAULT_BUCKET, DEFAULT_TIMEOUT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";

/// Overrides the configuration directory (used by tests and scripted setups).
pub const CONFIG_DIR_ENV: &str = "NOTEDECK_CONFIG_DIR";

/// Configuration for notedeck, stored in `<config dir>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotesConfig {
    /// Backend used when no mode is given on the command line
    #[serde(default)]
    pub mode: Mode,

    /// Base URL of the object-storage API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bucket that holds every remote note
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// HTTP timeout for remote calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Notes directory for local mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            api_base: default_api_base(),
            bucket: default_bucket(),
            timeout_secs: default_timeout_secs(),
            local_dir: None,
        }
    }
}

impl NotesConfig {
    /// Where config.json lives: `$NOTEDECK_CONFIG_DIR`, else the platform config dir.
    pub fn default_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        ProjectDirs::from("com", "notedeck", "notedeck")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| NoteError::Config("Could not determine config dir".to_string()))
    }

    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(NoteError::Io)?;
        let config: NotesConfig =
            serde_json::from_str(&content).map_err(NoteError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(NoteError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(NoteError::Serialization)?;
        fs::write(config_path, content).map_err(NoteError::Io)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Value of a user-facing key (`mode`, `api-base`, `bucket`, `timeout`, `local-dir`).
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "mode" => Ok(self.mode.to_string()),
            "api-base" => Ok(self.api_base.clone()),
            "bucket" => Ok(self.bucket.clone()),
            "timeout" => Ok(self.timeout_secs.to_string()),
            "local-dir" => Ok(self
                .local_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            other => Err(NoteError::Config(format!("Unknown config key: {}", other))),
        }
    }

    /// Set a user-facing key from its string form. An empty `local-dir` unsets it;
    /// a relative one is resolved against the current directory.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "mode" => self.mode = value.parse()?,
            "api-base" => self.api_base = value.trim_end_matches('/').to_string(),
            "bucket" => {
                if value.is_empty() {
                    return Err(NoteError::Config("Bucket name cannot be empty".to_string()));
                }
                self.bucket = value.to_string();
            }
            "timeout" => {
                self.timeout_secs = value
                    .parse()
                    .map_err(|_| NoteError::Config(format!("Invalid timeout: {}", value)))?;
            }
            "local-dir" => {
                self.local_dir = if value.is_empty() {
                    None
                } else {
                    Some(std::path::absolute(value).map_err(NoteError::Io)?)
                };
            }
            other => {
                return Err(NoteError::Config(format!("Unknown config key: {}", other)));
            }
        }
        Ok(())
    }

    pub const KEYS: [&'static str; 5] = ["mode", "api-base", "bucket", "timeout", "local-dir"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NotesConfig::default();
        assert_eq!(config.mode, Mode::Remote);
        assert_eq!(config.api_base, "http://127.0.0.1:8000/api");
        assert_eq!(config.bucket, "not7");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.local_dir.is_none());
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = NotesConfig::load(temp_dir.path().join("absent")).unwrap();
        assert_eq!(config, NotesConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("nested");

        let mut config = NotesConfig::default();
        config.set("mode", "local").unwrap();
        config.set("local-dir", "/tmp/notes").unwrap();
        config.save(&config_dir).unwrap();

        let loaded = NotesConfig::load(&config_dir).unwrap();
        assert_eq!(loaded.mode, Mode::Local);
        assert_eq!(loaded.local_dir, Some(PathBuf::from("/tmp/notes")));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            r#"{"bucket": "work"}"#,
        )
        .unwrap();

        let config = NotesConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.bucket, "work");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.mode, Mode::Remote);
    }

    #[test]
    fn test_get_and_set_keys() {
        let mut config = NotesConfig::default();
        config.set("api-base", "http://example.com/api/").unwrap();
        config.set("timeout", "30").unwrap();
        assert_eq!(config.get("api-base").unwrap(), "http://example.com/api");
        assert_eq!(config.get("timeout").unwrap(), "30");
        assert_eq!(config.get("local-dir").unwrap(), "");

        assert!(config.set("timeout", "soon").is_err());
        assert!(config.set("mode", "cloud").is_err());
        assert!(config.set("bucket", "").is_err());
        assert!(config.get("colour").is_err());

        config.set("local-dir", "notes").unwrap();
        let stored = config.local_dir.clone().unwrap();
        assert!(stored.is_absolute());
        assert_eq!(stored, std::env::current_dir().unwrap().join("notes"));

        config.set("local-dir", "/x").unwrap();
        assert_eq!(config.local_dir, Some(PathBuf::from("/x")));
        config.set("local-dir", "").unwrap();
        assert!(config.local_dir.is_none());
    }
}
