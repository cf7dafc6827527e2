//! Remote operations offered for open tabs, models and the whole project

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::file_ref::{FileRef, ModelAction};
use crate::gateway::{GatewayError, MaintenanceTask, ModelOperation, RemoteGateway};
use crate::notify::{ConfirmPrompt, Confirmer, Notifications};

/// An operation the user can trigger from a tab, the file tree or the
/// settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteAction {
    RunMigration,
    RollbackMigration,
    RunAlter,
    Truncate,
    FirstDeploy,
    GenerateModels,
    Backup,
    GenerateMigrations,
}

/// What an action asks the backend to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    Model(ModelOperation),
    Project(MaintenanceTask),
}

impl RemoteAction {
    pub fn target(&self) -> ActionTarget {
        match self {
            RemoteAction::RunMigration => ActionTarget::Model(ModelOperation::Migrate),
            RemoteAction::RollbackMigration => ActionTarget::Model(ModelOperation::Rollback),
            RemoteAction::RunAlter => ActionTarget::Model(ModelOperation::Alter),
            RemoteAction::Truncate => ActionTarget::Model(ModelOperation::Truncate),
            RemoteAction::FirstDeploy => ActionTarget::Project(MaintenanceTask::FirstDeploy),
            RemoteAction::GenerateModels => ActionTarget::Project(MaintenanceTask::GenerateModels),
            RemoteAction::Backup => ActionTarget::Project(MaintenanceTask::Backup),
            RemoteAction::GenerateMigrations => {
                ActionTarget::Project(MaintenanceTask::GenerateMigrations)
            }
        }
    }

    /// Button label
    pub fn label(&self) -> &'static str {
        match self {
            RemoteAction::RunMigration => "Run Migration",
            RemoteAction::RollbackMigration => "Drop Migration",
            RemoteAction::RunAlter => "Run Alter",
            RemoteAction::Truncate => "Truncate",
            RemoteAction::FirstDeploy => "First Deploy",
            RemoteAction::GenerateModels => "Generate Basic Model",
            RemoteAction::Backup => "Backup Project",
            RemoteAction::GenerateMigrations => "Generate Migration",
        }
    }

    fn success_message(&self, model: &str) -> String {
        match self {
            RemoteAction::RunMigration => "Migration executed successfully".to_string(),
            RemoteAction::RollbackMigration => "Migration rolled back successfully".to_string(),
            RemoteAction::RunAlter => "Alter table executed successfully".to_string(),
            RemoteAction::Truncate => format!("Table {model} truncated successfully"),
            RemoteAction::FirstDeploy => "First deploy executed successfully".to_string(),
            RemoteAction::GenerateModels => "Basic model generated successfully".to_string(),
            RemoteAction::Backup => "Project backup completed successfully".to_string(),
            RemoteAction::GenerateMigrations => "Migration generated successfully".to_string(),
        }
    }

    fn failure_message(&self, model: &str, error: &GatewayError) -> String {
        match self {
            RemoteAction::RunMigration => format!("Failed to execute migration: {error}"),
            RemoteAction::RollbackMigration => format!("Failed to rollback migration: {error}"),
            RemoteAction::RunAlter => format!("Failed to alter table: {error}"),
            RemoteAction::Truncate => format!("Failed to truncate {model}: {error}"),
            RemoteAction::FirstDeploy => format!("First deploy failed: {error}"),
            RemoteAction::GenerateModels => format!("Failed to generate model: {error}"),
            RemoteAction::Backup => format!("Backup failed: {error}"),
            RemoteAction::GenerateMigrations => format!("Migration generation failed: {error}"),
        }
    }

    /// Parse a CLI-style action name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "migrate" | "run-migration" => Some(RemoteAction::RunMigration),
            "rollback" | "drop-migration" => Some(RemoteAction::RollbackMigration),
            "alter" | "run-alter" => Some(RemoteAction::RunAlter),
            "truncate" => Some(RemoteAction::Truncate),
            "deploy" | "first-deploy" => Some(RemoteAction::FirstDeploy),
            "generate-models" => Some(RemoteAction::GenerateModels),
            "backup" => Some(RemoteAction::Backup),
            "generate-migrations" => Some(RemoteAction::GenerateMigrations),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of dispatching a remote action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// The backend rejected the operation; a notification was shown
    Failed(GatewayError),
    /// The user declined the confirmation
    Cancelled,
    /// Another operation is running for the same tab or model
    Busy(RemoteAction),
    /// The action does not apply to this tab
    Unavailable,
}

/// Actions offered for a tab
pub fn available_actions(tab: &FileRef) -> Vec<RemoteAction> {
    match tab.model_action_kind() {
        Some(ModelAction::Migration) => {
            vec![RemoteAction::RunMigration, RemoteAction::RollbackMigration]
        }
        Some(ModelAction::Alter) => vec![RemoteAction::RunAlter],
        _ => Vec::new(),
    }
}

/// Runs remote operations with confirmation and one operation per target at
/// a time. Never touches document state.
#[derive(Clone)]
pub struct ActionDispatcher {
    gateway: Arc<dyn RemoteGateway>,
    notifications: Notifications,
    busy: Arc<DashMap<String, RemoteAction>>,
}

impl ActionDispatcher {
    pub fn new(gateway: Arc<dyn RemoteGateway>, notifications: Notifications) -> Self {
        Self {
            gateway,
            notifications,
            busy: Arc::new(DashMap::new()),
        }
    }

    /// Action currently running for a tab
    pub fn busy_action(&self, tab: &FileRef) -> Option<RemoteAction> {
        self.busy.get(&tab.to_string()).map(|entry| *entry)
    }

    pub fn is_busy(&self, tab: &FileRef) -> bool {
        self.busy.contains_key(&tab.to_string())
    }

    /// Run `action` for the model behind `tab`
    pub async fn dispatch(
        &self,
        tab: &FileRef,
        action: RemoteAction,
        confirmer: &dyn Confirmer,
    ) -> ActionOutcome {
        if !available_actions(tab).contains(&action) {
            tracing::debug!("{} is not available for {}", action, tab);
            return ActionOutcome::Unavailable;
        }
        self.run(tab.to_string(), tab.name(), action, confirmer)
            .await
    }

    /// Empty a model's table
    pub async fn truncate(&self, model: &str, confirmer: &dyn Confirmer) -> ActionOutcome {
        let key = format!("table-{model}");
        self.run(key, model, RemoteAction::Truncate, confirmer).await
    }

    /// Run a project-wide maintenance job. Each job runs at most once at a time.
    pub async fn run_maintenance(
        &self,
        action: RemoteAction,
        confirmer: &dyn Confirmer,
    ) -> ActionOutcome {
        let ActionTarget::Project(task) = action.target() else {
            return ActionOutcome::Unavailable;
        };
        let key = format!("project-{}", task.as_str());
        self.run(key, "project", action, confirmer).await
    }

    /// Latest rows of a model's table. Failures are reported and yield `None`.
    pub async fn last_rows(&self, model: &str) -> Option<Vec<serde_json::Value>> {
        match self.gateway.last_rows(model).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                self.notifications
                    .error(format!("Failed to load rows of {model}: {e}"));
                None
            }
        }
    }

    async fn run(
        &self,
        key: String,
        model: &str,
        action: RemoteAction,
        confirmer: &dyn Confirmer,
    ) -> ActionOutcome {
        if let Some(running) = self.busy.get(&key).map(|entry| *entry) {
            return ActionOutcome::Busy(running);
        }

        let prompt = match action.target() {
            ActionTarget::Model(_) => ConfirmPrompt::RemoteOperation {
                operation: action.label().to_string(),
                model: model.to_string(),
            },
            ActionTarget::Project(_) => ConfirmPrompt::Maintenance {
                task: action.label().to_string(),
            },
        };
        if !confirmer.confirm(&prompt) {
            return ActionOutcome::Cancelled;
        }

        match self.busy.entry(key.clone()) {
            Entry::Occupied(entry) => return ActionOutcome::Busy(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(action);
            }
        }

        tracing::info!("Running {} for {}", action, model);
        let result = match action.target() {
            ActionTarget::Model(operation) => {
                self.gateway.run_model_operation(model, operation).await
            }
            ActionTarget::Project(task) => self.gateway.run_maintenance(task).await.map(|_| ()),
        };
        self.busy.remove(&key);

        match result {
            Ok(()) => {
                self.notifications.success(action.success_message(model));
                ActionOutcome::Completed
            }
            Err(e) => {
                self.notifications.error(action.failure_message(model, &e));
                ActionOutcome::Failed(e)
            }
        }
    }
}
