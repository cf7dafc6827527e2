//! Remote file gateway
//!
//! Maps logical file identifiers to backend endpoints. The gateway is a thin
//! request/response layer: no retries and no caching, apart from sharing one
//! in-flight file listing between concurrent callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file_ref::{FileKind, FileRef, ModelAction, strip_extension};

pub mod http;
pub mod http_client;
pub mod memory;
pub mod routes;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Errors returned by gateway calls
///
/// Cloneable so a single listing result can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Remote operations that can be run against a model's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelOperation {
    Migrate,
    Rollback,
    Alter,
    Truncate,
}

impl ModelOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelOperation::Migrate => "migrate",
            ModelOperation::Rollback => "rollback",
            ModelOperation::Alter => "alter",
            ModelOperation::Truncate => "truncate",
        }
    }
}

/// Project-wide backend jobs offered from the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceTask {
    /// Create, migrate, refresh and seed the database
    FirstDeploy,
    /// Generate a basic model class for every table
    GenerateModels,
    Backup,
    /// Generate migrations from the current database schema
    GenerateMigrations,
}

impl MaintenanceTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceTask::FirstDeploy => "first-deploy",
            MaintenanceTask::GenerateModels => "generate-models",
            MaintenanceTask::Backup => "backup",
            MaintenanceTask::GenerateMigrations => "generate-migrations",
        }
    }
}

/// A model entry from the project listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEntry {
    /// Model file name, usually with a `.php` extension
    pub file: String,
    pub model: bool,
    pub table: bool,
    pub alias: bool,
    pub view: bool,
}

impl ModelEntry {
    /// Model class name without extension
    pub fn name(&self) -> &str {
        strip_extension(FileKind::Model, &self.file)
    }

    /// Derived documents that can be opened for this model
    pub fn documents(&self) -> Vec<FileRef> {
        [
            ModelAction::Migration,
            ModelAction::Alter,
            ModelAction::Basic,
            ModelAction::Custom,
        ]
        .into_iter()
        .map(|action| FileRef::model_action(self.name(), action))
        .collect()
    }
}

/// Which parts of the project the connected user may edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Frontend,
    Backend,
    Full,
}

/// File listing returned by `GET /models`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFiles {
    pub models: Vec<ModelEntry>,
    pub js: Vec<String>,
    pub blades: Vec<String>,
    pub cores: Vec<String>,
    pub role: Option<ProjectRole>,
}

impl ProjectFiles {
    /// Every openable file in listing order: cores, blades, scripts, then model documents
    pub fn file_refs(&self) -> Vec<FileRef> {
        let cores = self
            .cores
            .iter()
            .map(|f| FileRef::core(strip_extension(FileKind::Core, f)));
        let blades = self
            .blades
            .iter()
            .map(|f| FileRef::blade(strip_extension(FileKind::Blade, f)));
        let scripts = self
            .js
            .iter()
            .map(|f| FileRef::js(strip_extension(FileKind::Js, f)));
        let models = self.models.iter().flat_map(ModelEntry::documents);

        cores.chain(blades).chain(scripts).chain(models).collect()
    }
}

/// Backend API consumed by the workspace
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// List project files. Concurrent callers share one in-flight request.
    async fn list_files(&self) -> Result<ProjectFiles, GatewayError>;

    /// Fetch the current content of a file or derived document
    async fn read_file(&self, file: &FileRef) -> Result<String, GatewayError>;

    /// Replace the content of a file or derived document
    async fn write_file(&self, file: &FileRef, content: &str) -> Result<(), GatewayError>;

    async fn delete_file(&self, file: &FileRef) -> Result<(), GatewayError>;

    /// Run a table operation for the given model
    async fn run_model_operation(
        &self,
        model: &str,
        operation: ModelOperation,
    ) -> Result<(), GatewayError>;

    /// Most recent rows of a model's table
    async fn last_rows(&self, model: &str) -> Result<Vec<serde_json::Value>, GatewayError>;

    /// Ask the backend to scaffold a new migration
    async fn create_migration(&self, name: &str) -> Result<serde_json::Value, GatewayError>;

    /// Run a project-wide maintenance job
    async fn run_maintenance(
        &self,
        task: MaintenanceTask,
    ) -> Result<serde_json::Value, GatewayError>;

    /// Check a developer token and backend password against the server
    async fn connect(
        &self,
        developer_token: &str,
        password: &str,
    ) -> Result<serde_json::Value, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_deserializes_partial_payload() {
        let payload = json!({
            "models": [{ "file": "Order.php", "model": true, "table": true }],
            "blades": ["login.blade.php"]
        });

        let files: ProjectFiles = serde_json::from_value(payload).unwrap();
        assert_eq!(files.models.len(), 1);
        assert!(files.models[0].model);
        assert!(!files.models[0].view);
        assert!(files.js.is_empty());
        assert_eq!(files.role, None);
    }

    #[test]
    fn test_listing_file_refs_strip_extensions() {
        let files = ProjectFiles {
            models: vec![ModelEntry {
                file: "Order.php".to_string(),
                ..Default::default()
            }],
            js: vec!["dashboard.js".to_string()],
            blades: vec!["login.blade.php".to_string()],
            cores: vec!["Bootstrap.php".to_string()],
            role: Some(ProjectRole::Full),
        };

        let ids: Vec<String> = files.file_refs().iter().map(|f| f.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "core-Bootstrap",
                "blade-login",
                "js-dashboard",
                "model-Order-migration",
                "model-Order-alter",
                "model-Order-basic",
                "model-Order-custom",
            ]
        );
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        let files: ProjectFiles = serde_json::from_value(json!({ "role": "backend" })).unwrap();
        assert_eq!(files.role, Some(ProjectRole::Backend));
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "server responded with 500: boom");
    }
}
