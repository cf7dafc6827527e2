//! Application state for one connected project
//!
//! A [`Workspace`] is built once per active project and owns everything the
//! editor needs: configuration, the gateway, the open tabs and the widget
//! binding, the action dispatcher and the notification queue. Switching
//! project means tearing one workspace down and building another.

use std::sync::Arc;

use crate::actions::ActionDispatcher;
use crate::config::Config;
use crate::file_ref::FileRef;
use crate::gateway::{
    GatewayError, HttpGateway, ProjectFiles, ProjectRole, RemoteGateway, routes,
};
use crate::keymap::{Command, KeyChord};
use crate::lifecycle::{KeyOutcome, LeaveOutcome, LifecycleController};
use crate::notify::{ConfirmPrompt, Confirmer, Notifications};
use crate::project::{ApiConfig, Project, redact_secret};
use crate::store::{DocumentStore, OpenOutcome, StoreError};
use crate::widget::EditorWidget;

/// One model and its derived documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNode {
    pub name: String,
    pub documents: Vec<FileRef>,
}

/// Sidebar contents built from the project listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    pub models: Vec<ModelNode>,
    pub blades: Vec<FileRef>,
    pub scripts: Vec<FileRef>,
    pub cores: Vec<FileRef>,
}

impl FileTree {
    /// Build the tree, hiding server-side files from frontend-only users
    pub fn from_listing(listing: &ProjectFiles) -> Self {
        let mut tree = Self::default();
        for id in listing.file_refs() {
            match id {
                FileRef::Blade(_) => tree.blades.push(id),
                FileRef::Js(_) => tree.scripts.push(id),
                FileRef::Core(_) => tree.cores.push(id),
                FileRef::Model { .. } => {}
            }
        }
        tree.models = listing
            .models
            .iter()
            .map(|entry| ModelNode {
                name: entry.name().to_string(),
                documents: entry.documents(),
            })
            .collect();

        if listing.role == Some(ProjectRole::Frontend) {
            tree.models.clear();
            tree.cores.clear();
        }
        tree
    }

    /// Every file in the tree, in sidebar order
    pub fn files(&self) -> impl Iterator<Item = &FileRef> {
        self.models
            .iter()
            .flat_map(|m| m.documents.iter())
            .chain(&self.blades)
            .chain(&self.scripts)
            .chain(&self.cores)
    }
}

/// Result of [`Workspace::delete_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined the confirmation; nothing was sent
    Cancelled,
}

/// Whether deleting `deleted` on the server removes the document behind `tab`.
/// A model is deleted together with every document derived from it.
fn removed_by(deleted: &FileRef, tab: &FileRef) -> bool {
    match (deleted, tab) {
        (FileRef::Model { name, .. }, FileRef::Model { name: other, .. }) => name == other,
        _ => deleted == tab,
    }
}

pub struct Workspace<W: EditorWidget> {
    config: Config,
    gateway: Arc<dyn RemoteGateway>,
    notifications: Notifications,
    controller: LifecycleController<W>,
    dispatcher: ActionDispatcher,
    listing: Option<ProjectFiles>,
    sidebar_visible: bool,
}

impl<W: EditorWidget> Workspace<W> {
    pub fn new(config: Config, gateway: Arc<dyn RemoteGateway>, widget: W) -> Self {
        let notifications = Notifications::new(config.notifications.ttl());
        let store = DocumentStore::new(Arc::clone(&gateway));
        let controller = LifecycleController::new(
            store,
            widget,
            notifications.clone(),
            config.editor.debounce(),
        );
        let dispatcher = ActionDispatcher::new(Arc::clone(&gateway), notifications.clone());

        Self {
            config,
            gateway,
            notifications,
            controller,
            dispatcher,
            listing: None,
            sidebar_visible: true,
        }
    }

    /// Connect to a project's backend over HTTP
    pub fn connect(config: Config, project: &Project, widget: W) -> anyhow::Result<Self> {
        let api = ApiConfig::from_project(project)?;
        tracing::info!(
            "Connecting to {} as {}",
            api.base_url,
            redact_secret(&project.developer_token)
        );
        let gateway = HttpGateway::new(api, &config.http)?;
        Ok(Self::new(config, Arc::new(gateway), widget))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> Arc<dyn RemoteGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn store(&self) -> &DocumentStore {
        self.controller.store()
    }

    pub fn controller(&self) -> &LifecycleController<W> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut LifecycleController<W> {
        &mut self.controller
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    /// Last listing fetched from the backend
    pub fn listing(&self) -> Option<&ProjectFiles> {
        self.listing.as_ref()
    }

    /// Fetch the project listing
    pub async fn refresh_listing(&mut self) -> Result<&ProjectFiles, GatewayError> {
        match self.gateway.list_files().await {
            Ok(listing) => Ok(self.listing.insert(listing)),
            Err(e) => {
                self.notifications
                    .error(format!("Failed to load project files: {e}"));
                Err(e)
            }
        }
    }

    pub fn file_tree(&self) -> FileTree {
        self.listing
            .as_ref()
            .map(FileTree::from_listing)
            .unwrap_or_default()
    }

    pub async fn open(&mut self, id: &FileRef) -> Result<OpenOutcome, StoreError> {
        self.controller.open(id).await
    }

    /// Route a key press. Returns whether the caller must suppress it.
    pub async fn handle_key(&mut self, chord: &KeyChord) -> KeyOutcome {
        let outcome = self.controller.handle_key(chord).await;
        if outcome == KeyOutcome::Handled(Command::ToggleSidebar) {
            self.sidebar_visible = !self.sidebar_visible;
        }
        outcome
    }

    /// Create a migration on the backend and reload the listing
    pub async fn create_migration(&mut self, name: &str) -> Result<(), GatewayError> {
        if let Err(e) = self.gateway.create_migration(name).await {
            self.notifications
                .error(format!("Failed to create migration {name}: {e}"));
            return Err(e);
        }
        self.notifications
            .success(format!("Migration {name} created"));
        self.refresh_listing().await.map(|_| ())
    }

    /// Delete a file on the backend after confirmation.
    ///
    /// Tabs are only closed once the server accepted the delete, so a failed
    /// delete keeps every draft.
    pub async fn delete_file(
        &mut self,
        id: &FileRef,
        confirmer: &dyn Confirmer,
    ) -> Result<DeleteOutcome, GatewayError> {
        if let Err(e) = routes::delete_path(id) {
            self.notifications
                .error(format!("Cannot delete {}: {e}", id.display_name()));
            return Err(e);
        }

        let prompt = ConfirmPrompt::Delete {
            file: id.display_name(),
        };
        if !confirmer.confirm(&prompt) {
            return Ok(DeleteOutcome::Cancelled);
        }

        if let Err(e) = self.gateway.delete_file(id).await {
            self.notifications
                .error(format!("Failed to delete {}: {e}", id.display_name()));
            return Err(e);
        }

        for tab in self.store().tabs() {
            if removed_by(id, &tab) {
                self.controller.close(&tab);
            }
        }
        self.notifications
            .success(format!("{} deleted", id.display_name()));

        if let Err(e) = self.refresh_listing().await {
            tracing::debug!("Listing not refreshed after delete: {}", e);
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Close the workspace. Unsaved tabs need the user's confirmation.
    pub fn teardown(&mut self, confirmer: &dyn Confirmer) -> LeaveOutcome {
        let outcome = self.controller.request_leave(confirmer);
        if outcome == LeaveOutcome::Left {
            self.listing = None;
            self.notifications.drain();
            tracing::info!("Workspace closed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_ref::ModelAction;
    use crate::gateway::{MemoryGateway, ModelEntry};
    use crate::notify::{AlwaysConfirm, ConfirmPrompt};
    use crate::widget::MemoryWidget;
    use std::sync::Mutex;

    fn listing(role: Option<ProjectRole>) -> ProjectFiles {
        ProjectFiles {
            models: vec![ModelEntry {
                file: "Order.php".to_string(),
                model: true,
                table: true,
                ..ModelEntry::default()
            }],
            js: vec!["app.js".to_string()],
            blades: vec!["login.blade.php".to_string()],
            cores: vec!["Bootstrap.php".to_string()],
            role,
        }
    }

    fn workspace(gateway: &MemoryGateway) -> Workspace<MemoryWidget> {
        Workspace::new(
            Config::default(),
            Arc::new(gateway.clone()),
            MemoryWidget::new(),
        )
    }

    #[test]
    fn test_file_tree_from_listing() {
        let tree = FileTree::from_listing(&listing(Some(ProjectRole::Full)));
        assert_eq!(tree.models.len(), 1);
        assert_eq!(tree.models[0].name, "Order");
        assert_eq!(
            tree.models[0].documents[0],
            FileRef::model_action("Order", ModelAction::Migration)
        );
        assert_eq!(tree.blades, vec![FileRef::blade("login")]);
        assert_eq!(tree.scripts, vec![FileRef::js("app")]);
        assert_eq!(tree.cores, vec![FileRef::core("Bootstrap")]);
        assert_eq!(tree.files().count(), 7);
    }

    #[test]
    fn test_frontend_role_hides_server_files() {
        let tree = FileTree::from_listing(&listing(Some(ProjectRole::Frontend)));
        assert!(tree.models.is_empty());
        assert!(tree.cores.is_empty());
        assert_eq!(tree.blades.len(), 1);
        assert_eq!(tree.scripts.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_listing_builds_tree() {
        let gateway = MemoryGateway::new().with_listing(listing(None));
        let mut workspace = workspace(&gateway);
        assert_eq!(workspace.file_tree(), FileTree::default());

        workspace.refresh_listing().await.unwrap();
        assert_eq!(workspace.file_tree().cores, vec![FileRef::core("Bootstrap")]);
    }

    #[tokio::test]
    async fn test_refresh_listing_failure_notifies() {
        let gateway = MemoryGateway::new();
        gateway.fail_path("/models", 401);
        let mut workspace = workspace(&gateway);

        assert!(workspace.refresh_listing().await.is_err());
        assert!(workspace.notifications().last().unwrap().is_error());
        assert!(workspace.listing().is_none());
    }

    #[tokio::test]
    async fn test_toggle_sidebar_shortcut() {
        let mut workspace = workspace(&MemoryGateway::new());
        assert!(workspace.sidebar_visible());

        let outcome = workspace.handle_key(&KeyChord::ctrl("b")).await;
        assert_eq!(outcome, KeyOutcome::Handled(Command::ToggleSidebar));
        assert!(!workspace.sidebar_visible());
    }

    #[tokio::test]
    async fn test_delete_closes_tab_and_reloads_listing() {
        let id = FileRef::blade("login");
        let gateway = MemoryGateway::new()
            .with_file(id.clone(), "<form>")
            .with_listing(listing(None));
        let mut workspace = workspace(&gateway);
        workspace.open(&id).await.unwrap();

        let outcome = workspace.delete_file(&id, &AlwaysConfirm).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(workspace.store().tabs().is_empty());
        assert_eq!(gateway.count("DELETE", "/blades/login"), 1);
        assert_eq!(gateway.remote_content(&id), None);
        assert!(workspace.listing().is_some());
    }

    #[tokio::test]
    async fn test_delete_core_is_rejected_before_asking() {
        let id = FileRef::core("Bootstrap");
        let gateway = MemoryGateway::new().with_file(id.clone(), "<?php");
        let mut workspace = workspace(&gateway);
        workspace.open(&id).await.unwrap();
        workspace.store().set_draft_content(&id, "<?php // edited").unwrap();
        workspace.store().set_dirty(&id, true).unwrap();

        let asked = Mutex::new(Vec::new());
        let record = |prompt: &ConfirmPrompt| {
            asked.lock().unwrap().push(prompt.clone());
            true
        };
        let err = workspace.delete_file(&id, &record).await.unwrap_err();

        assert!(matches!(err, GatewayError::Unsupported(_)));
        assert!(asked.lock().unwrap().is_empty());
        assert!(workspace.notifications().last().unwrap().is_error());
        assert_eq!(workspace.store().tabs(), vec![id.clone()]);
        assert_eq!(
            workspace.store().get_content(&id).as_deref(),
            Some("<?php // edited")
        );
        assert!(gateway.calls().iter().all(|c| c.method != "DELETE"));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_tab_and_draft() {
        let id = FileRef::blade("login");
        let gateway = MemoryGateway::new().with_file(id.clone(), "<form>");
        let mut workspace = workspace(&gateway);
        workspace.open(&id).await.unwrap();
        workspace.store().set_draft_content(&id, "<form method=\"post\">").unwrap();
        workspace.store().set_dirty(&id, true).unwrap();
        gateway.fail_path("/blades/login", 500);

        let err = workspace.delete_file(&id, &AlwaysConfirm).await.unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 500, .. }));
        assert_eq!(workspace.store().tabs(), vec![id.clone()]);
        assert_eq!(workspace.controller().bound_tab(), Some(&id));
        assert!(workspace.store().is_dirty(&id));
        assert_eq!(
            workspace.store().get_content(&id).as_deref(),
            Some("<form method=\"post\">")
        );
        assert!(workspace.notifications().last().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_declined_delete_sends_nothing() {
        let id = FileRef::js("app");
        let gateway = MemoryGateway::new().with_file(id.clone(), "x");
        let mut workspace = workspace(&gateway);
        workspace.open(&id).await.unwrap();

        let decline = |prompt: &ConfirmPrompt| {
            assert_eq!(
                prompt,
                &ConfirmPrompt::Delete {
                    file: id.display_name()
                }
            );
            false
        };
        let outcome = workspace.delete_file(&id, &decline).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(gateway.count("DELETE", "/javascript/app"), 0);
        assert_eq!(workspace.store().tabs(), vec![id]);
    }

    #[tokio::test]
    async fn test_delete_model_closes_every_derived_tab() {
        let migration = FileRef::model_action("Order", ModelAction::Migration);
        let alter = FileRef::model_action("Order", ModelAction::Alter);
        let basic = FileRef::model_action("Order", ModelAction::Basic);
        let other_model = FileRef::model_action("Invoice", ModelAction::Migration);
        let blade = FileRef::blade("login");
        let mut gateway = MemoryGateway::new().with_listing(listing(None));
        for id in [&migration, &alter, &basic, &other_model, &blade] {
            gateway = gateway.with_file(id.clone(), "content");
        }
        let mut workspace = workspace(&gateway);
        for id in [&migration, &alter, &other_model, &basic, &blade] {
            workspace.open(id).await.unwrap();
        }
        workspace.controller_mut().activate(&alter).unwrap();

        let outcome = workspace.delete_file(&basic, &AlwaysConfirm).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(gateway.count("DELETE", "/trio/Order"), 1);
        assert_eq!(workspace.store().tabs(), vec![other_model, blade.clone()]);
        assert_eq!(workspace.store().active_tab(), Some(blade.clone()));
        assert_eq!(workspace.controller().bound_tab(), Some(&blade));
        assert_eq!(workspace.controller().live_model_count(), 1);
    }

    #[tokio::test]
    async fn test_create_migration_posts_name() {
        let gateway = MemoryGateway::new().with_listing(listing(None));
        let mut workspace = workspace(&gateway);

        workspace.create_migration("Invoice").await.unwrap();

        let post = gateway
            .calls()
            .into_iter()
            .find(|c| c.method == "POST")
            .unwrap();
        assert_eq!(post.path, "/migrations");
        assert_eq!(post.body.as_deref(), Some(r#"{"modul":"Invoice"}"#));
        assert!(workspace.listing().is_some());
    }

    #[tokio::test]
    async fn test_teardown_closes_everything() {
        let id = FileRef::js("app");
        let gateway = MemoryGateway::new()
            .with_file(id.clone(), "x")
            .with_listing(listing(None));
        let mut workspace = workspace(&gateway);
        workspace.refresh_listing().await.unwrap();
        workspace.open(&id).await.unwrap();

        let decline = |_: &ConfirmPrompt| false;
        assert_eq!(workspace.teardown(&decline), LeaveOutcome::Left);
        assert!(workspace.store().tabs().is_empty());
        assert!(workspace.listing().is_none());
        assert_eq!(workspace.controller().live_model_count(), 0);

        assert_eq!(workspace.teardown(&AlwaysConfirm), LeaveOutcome::Left);
    }
}
