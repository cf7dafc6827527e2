//! In-memory gateway
//!
//! Serves files from a map instead of a backend. Used for offline sessions
//! and to drive the workspace in tests, where failures and slow responses can
//! be injected per file.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{GatewayError, MaintenanceTask, ModelOperation, ProjectFiles, RemoteGateway, routes};
use crate::file_ref::FileRef;

/// A call observed by the gateway, in HTTP terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<FileRef, String>,
    listing: ProjectFiles,
    rows: HashMap<String, Vec<serde_json::Value>>,
    failing_paths: HashMap<String, u16>,
    read_delay: Option<Duration>,
    held_paths: HashSet<String>,
    held_calls: HashSet<(&'static str, String)>,
    credentials: Option<(String, String)>,
    calls: Vec<RecordedCall>,
}

/// Gateway backed by an in-memory file map
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
    release: Arc<Notify>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a file's remote content
    pub fn with_file(self, file: FileRef, content: &str) -> Self {
        self.state().files.insert(file, content.to_string());
        self
    }

    pub fn with_listing(self, listing: ProjectFiles) -> Self {
        self.state().listing = listing;
        self
    }

    pub fn with_rows(self, model: &str, rows: Vec<serde_json::Value>) -> Self {
        self.state().rows.insert(model.to_string(), rows);
        self
    }

    /// Make every request to `path` fail with `status`
    pub fn fail_path(&self, path: &str, status: u16) {
        self.state().failing_paths.insert(path.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.state().failing_paths.clear();
    }

    /// Delay every read by `delay`
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    /// Hold requests to `path` until [`MemoryGateway::release`] is called
    pub fn hold_path(&self, path: &str) {
        self.state().held_paths.insert(path.to_string());
    }

    /// Hold only requests with the given method to `path`
    pub fn hold_call(&self, method: &'static str, path: &str) {
        self.state().held_calls.insert((method, path.to_string()));
    }

    /// Accept only this token and password in [`RemoteGateway::connect`]
    pub fn with_credentials(self, developer_token: &str, password: &str) -> Self {
        self.state().credentials = Some((developer_token.to_string(), password.to_string()));
        self
    }

    /// Let every held request complete
    pub fn release(&self) {
        let mut state = self.state();
        state.held_paths.clear();
        state.held_calls.clear();
        drop(state);
        self.release.notify_waiters();
    }

    /// Overwrite a file as if another user changed it remotely
    pub fn set_remote_content(&self, file: &FileRef, content: &str) {
        self.state().files.insert(file.clone(), content.to_string());
    }

    pub fn remote_content(&self, file: &FileRef) -> Option<String> {
        self.state().files.get(file).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls with the given method and path
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Record the call, wait while it is held, then report an injected failure
    async fn enter(
        &self,
        method: &'static str,
        path: &str,
        body: Option<String>,
    ) -> Result<(), GatewayError> {
        self.state().calls.push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        loop {
            let released = self.release.notified();
            let held = {
                let state = self.state();
                state.held_paths.contains(path)
                    || state.held_calls.contains(&(method, path.to_string()))
            };
            if !held {
                break;
            }
            released.await;
        }

        match self.state().failing_paths.get(path) {
            Some(status) => Err(GatewayError::Status {
                status: *status,
                body: format!("injected failure for {path}"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn list_files(&self) -> Result<ProjectFiles, GatewayError> {
        self.enter("GET", routes::LIST_FILES, None).await?;
        Ok(self.state().listing.clone())
    }

    async fn read_file(&self, file: &FileRef) -> Result<String, GatewayError> {
        let delay = self.state().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.enter("GET", &routes::read_path(file), None).await?;
        self.state()
            .files
            .get(file)
            .cloned()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: format!("{file} not found"),
            })
    }

    async fn write_file(&self, file: &FileRef, content: &str) -> Result<(), GatewayError> {
        let path = routes::write_path(file)?;
        let body = serde_json::json!({ "text": content }).to_string();
        self.enter("PUT", &path, Some(body)).await?;
        self.state().files.insert(file.clone(), content.to_string());
        Ok(())
    }

    async fn delete_file(&self, file: &FileRef) -> Result<(), GatewayError> {
        let path = routes::delete_path(file)?;
        self.enter("DELETE", &path, None).await?;
        self.state().files.remove(file);
        Ok(())
    }

    async fn run_model_operation(
        &self,
        model: &str,
        operation: ModelOperation,
    ) -> Result<(), GatewayError> {
        self.enter("GET", &routes::operation_path(model, operation), None)
            .await?;
        if operation == ModelOperation::Truncate {
            self.state().rows.remove(model);
        }
        Ok(())
    }

    async fn last_rows(&self, model: &str) -> Result<Vec<serde_json::Value>, GatewayError> {
        self.enter("GET", &routes::last_rows_path(model), None).await?;
        Ok(self.state().rows.get(model).cloned().unwrap_or_default())
    }

    async fn create_migration(&self, name: &str) -> Result<serde_json::Value, GatewayError> {
        let body = serde_json::json!({ "modul": name });
        self.enter("POST", routes::CREATE_MIGRATION, Some(body.to_string()))
            .await?;
        Ok(serde_json::json!({ "created": name }))
    }

    async fn run_maintenance(
        &self,
        task: MaintenanceTask,
    ) -> Result<serde_json::Value, GatewayError> {
        self.enter("GET", routes::maintenance_path(task), None)
            .await?;
        Ok(serde_json::json!({ "task": task.as_str() }))
    }

    async fn connect(
        &self,
        developer_token: &str,
        password: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let body = serde_json::json!({ "password": password, "token": developer_token });
        self.enter("POST", routes::CONNECT, Some(body.to_string()))
            .await?;

        let accepted = match &self.state().credentials {
            Some((token, expected)) => token == developer_token && expected == password,
            None => true,
        };
        if accepted {
            Ok(serde_json::json!({ "connected": true }))
        } else {
            Err(GatewayError::Status {
                status: 401,
                body: "Connection failed".to_string(),
            })
        }
    }
}
