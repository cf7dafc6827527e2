//! Projects and backend connection settings.
//!
//! A project names a Laravel backend (`root_address`) together with the
//! credentials the backend expects on every request. The list of known
//! projects and the active one are persisted as JSON in the user config
//! directory.
//!
//! ## Security
//!
//! - The developer token and backend password are only sent as request headers
//! - They are NEVER logged; use [`redact_secret`] when a value must be shown

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Path segment under the project root where the backend API lives
const API_PREFIX: &str = "/laradev";

const PROJECTS_FILE: &str = "projects.json";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("invalid root address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unknown project '{0}'")]
    UnknownProject(String),

    #[error("no config directory available")]
    NoConfigDir,

    #[error("failed to access project store: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt project store: {0}")]
    Json(#[from] serde_json::Error),
}

/// A backend the user can connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Root URL of the Laravel application, e.g. `https://shop.example.com`
    pub root_address: String,
    pub developer_token: String,
    pub backend_password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        root_address: impl Into<String>,
        developer_token: impl Into<String>,
        backend_password: impl Into<String>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: created_at.timestamp_millis().to_string(),
            name: name.into(),
            root_address: root_address.into(),
            developer_token: developer_token.into(),
            backend_password: backend_password.into(),
            created_at,
            last_accessed: None,
        }
    }
}

/// Base URL and headers for every backend request of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
}

impl ApiConfig {
    /// Derive the API configuration for a project
    pub fn from_project(project: &Project) -> Result<Self, ProjectError> {
        let root = project.root_address.trim_end_matches('/');
        let url = Url::parse(root).map_err(|e| ProjectError::InvalidAddress {
            address: project.root_address.clone(),
            reason: e.to_string(),
        })?;

        let Some(host) = url.host_str() else {
            return Err(ProjectError::InvalidAddress {
                address: project.root_address.clone(),
                reason: "missing host".to_string(),
            });
        };
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut headers = BTreeMap::new();
        headers.insert(
            "developer-token".to_string(),
            project.developer_token.clone(),
        );
        headers.insert("host".to_string(), host);
        headers.insert("laradev".to_string(), project.backend_password.clone());

        Ok(Self {
            base_url: format!("{root}{API_PREFIX}"),
            headers,
        })
    }
}

/// Redact a secret for safe logging.
///
/// Shows only the first few characters to help identify which credential is
/// in use without exposing it.
pub fn redact_secret(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        let prefix: String = secret.chars().take(4).collect();
        format!("{prefix}...")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    active: Option<String>,
}

/// Persistent list of known projects
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    /// Store in the user config directory
    pub fn open_default() -> Result<Self, ProjectError> {
        let dir = dirs::config_dir()
            .ok_or(ProjectError::NoConfigDir)?
            .join("laradev-editor");
        Ok(Self::at(dir.join(PROJECTS_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ProjectFile, ProjectError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &ProjectFile) -> Result<(), ProjectError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    pub fn projects(&self) -> Result<Vec<Project>, ProjectError> {
        Ok(self.read()?.projects)
    }

    /// Add a project, replacing any existing one with the same id
    pub fn add(&self, project: Project) -> Result<(), ProjectError> {
        let mut file = self.read()?;
        file.projects.retain(|p| p.id != project.id);
        tracing::info!(
            "Saving project {} ({}, token {})",
            project.name,
            project.root_address,
            redact_secret(&project.developer_token)
        );
        file.projects.push(project);
        self.write(&file)
    }

    pub fn active(&self) -> Result<Option<Project>, ProjectError> {
        let file = self.read()?;
        Ok(file
            .active
            .as_ref()
            .and_then(|id| file.projects.iter().find(|p| &p.id == id))
            .cloned())
    }

    /// Mark a project as active and record when it was accessed
    pub fn set_active(&self, id: &str) -> Result<Project, ProjectError> {
        let mut file = self.read()?;
        let project = file
            .projects
            .iter_mut()
            .find(|p| p.id == id || p.name == id)
            .ok_or_else(|| ProjectError::UnknownProject(id.to_string()))?;
        project.last_accessed = Some(Utc::now());
        let project = project.clone();

        file.active = Some(project.id.clone());
        self.write(&file)?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(root: &str) -> Project {
        Project::new("shop", root, "dev-token-123", "hunter22")
    }

    #[test]
    fn test_api_config_from_project() {
        let api = ApiConfig::from_project(&project("https://shop.example.com/")).unwrap();
        assert_eq!(api.base_url, "https://shop.example.com/laradev");
        assert_eq!(api.headers["developer-token"], "dev-token-123");
        assert_eq!(api.headers["host"], "shop.example.com");
        assert_eq!(api.headers["laradev"], "hunter22");
    }

    #[test]
    fn test_api_config_keeps_port_in_host() {
        let api = ApiConfig::from_project(&project("http://127.0.0.1:8000")).unwrap();
        assert_eq!(api.base_url, "http://127.0.0.1:8000/laradev");
        assert_eq!(api.headers["host"], "127.0.0.1:8000");
    }

    #[test]
    fn test_api_config_invalid_address() {
        assert!(matches!(
            ApiConfig::from_project(&project("not a url")),
            Err(ProjectError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_redact_secret() {
        assert_eq!(redact_secret("abc"), "****");
        assert_eq!(redact_secret("abcdefgh"), "abcd...");
        assert_eq!(redact_secret("dev-token-123"), "dev-...");
    }

    #[test]
    fn test_project_serializes_camel_case() {
        let json = serde_json::to_value(project("https://a.test")).unwrap();
        assert!(json.get("rootAddress").is_some());
        assert!(json.get("developerToken").is_some());
        assert!(json.get("lastAccessed").is_none());
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::at(dir.path().join("nested").join(PROJECTS_FILE));

        assert!(store.projects().unwrap().is_empty());
        assert!(store.active().unwrap().is_none());

        let shop = project("https://shop.example.com");
        store.add(shop.clone()).unwrap();
        assert_eq!(store.projects().unwrap(), vec![shop.clone()]);

        let active = store.set_active("shop").unwrap();
        assert_eq!(active.id, shop.id);
        assert!(active.last_accessed.is_some());
        assert_eq!(store.active().unwrap().map(|p| p.id), Some(shop.id));
    }

    #[test]
    fn test_store_add_replaces_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::at(dir.path().join(PROJECTS_FILE));

        let mut shop = project("https://shop.example.com");
        store.add(shop.clone()).unwrap();
        shop.name = "shop-renamed".to_string();
        store.add(shop).unwrap();

        let projects = store.projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "shop-renamed");
    }

    #[test]
    fn test_set_active_unknown_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::at(dir.path().join(PROJECTS_FILE));
        assert!(matches!(
            store.set_active("missing"),
            Err(ProjectError::UnknownProject(_))
        ));
    }
}
