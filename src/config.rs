//! Configuration management for the editor workbench

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default quiescence window before an edit updates dirty state
const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default request timeout for backend calls
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// How long a transient notification stays visible
const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Workbench configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Editing behaviour
    pub editor: EditorConfig,
    /// Backend connection settings
    pub http: HttpConfig,
    /// Notification settings
    pub notifications: NotificationConfig,
}

/// Editing behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Milliseconds of quiet after the last keystroke before dirty state is recomputed
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Seconds before a transient notification is dismissed
    pub ttl_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_NOTIFICATION_TTL_SECS,
        }
    }
}

impl NotificationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Parse configuration from a JSON value, falling back to defaults when
    /// the value is missing or malformed
    pub fn from_json(value: Option<serde_json::Value>) -> Self {
        match value {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Self::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from the user config directory if a config file exists there
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `~/.config/laradev-editor/config.toml` (platform equivalent)
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("laradev-editor").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.editor.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(config.editor.debounce(), Duration::from_millis(300));
        assert_eq!(config.http.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.http.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.notifications.ttl(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_from_json() {
        let json = json!({
            "editor": { "debounce_ms": 50 },
            "http": { "timeout_secs": 30, "connect_timeout_secs": 2 },
            "notifications": { "ttl_secs": 8 }
        });

        let config = Config::from_json(Some(json));
        assert_eq!(config.editor.debounce_ms, 50);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.connect_timeout_secs, 2);
        assert_eq!(config.notifications.ttl_secs, 8);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_json(Some(json!({ "http": { "timeout_secs": 60 } })));
        assert_eq!(config.http.timeout_secs, 60);
        // Other fields should use defaults
        assert_eq!(config.http.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.editor.debounce_ms, DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn test_from_json_none_and_invalid() {
        assert_eq!(
            Config::from_json(None).editor.debounce_ms,
            DEFAULT_DEBOUNCE_MS
        );
        assert_eq!(
            Config::from_json(Some(json!("invalid"))).editor.debounce_ms,
            DEFAULT_DEBOUNCE_MS
        );
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\ndebounce_ms = 120\n\n[http]\ntimeout_secs = 4").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.editor.debounce_ms, 120);
        assert_eq!(config.http.timeout_secs, 4);
        assert_eq!(config.notifications.ttl_secs, DEFAULT_NOTIFICATION_TTL_SECS);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor\ndebounce_ms = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
