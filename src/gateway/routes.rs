//! Endpoint paths for each remote operation
//!
//! Paths are relative to the project's API base URL and may carry a query
//! string. They are kept separate from the HTTP client so the mapping can be
//! checked without a server.

use super::{GatewayError, MaintenanceTask, ModelOperation};
use crate::file_ref::{FileRef, ModelAction};

pub const LIST_FILES: &str = "/models";
pub const CREATE_MIGRATION: &str = "/migrations";
pub const CONNECT: &str = "/connect";

/// Path used to read a file or derived document
pub fn read_path(file: &FileRef) -> String {
    match file {
        FileRef::Core(name) => format!("/cores/{name}"),
        FileRef::Blade(name) => format!("/blades/{name}"),
        FileRef::Js(name) => format!("/javascript/{name}"),
        FileRef::Model { name, action } => match action {
            Some(ModelAction::Migration) => format!("/migrations/{name}"),
            Some(ModelAction::Alter) => format!("/alter/{name}"),
            Some(ModelAction::Basic) => format!("/models/{name}?basic=true"),
            Some(ModelAction::Custom) => format!("/models/{name}?custom=true"),
            Some(ModelAction::Other(_)) | None => format!("/models/{name}"),
        },
    }
}

/// Path used to save a file or derived document
///
/// Bare models and unknown model actions have no write endpoint.
pub fn write_path(file: &FileRef) -> Result<String, GatewayError> {
    match file {
        FileRef::Model { action: None, .. } => Err(GatewayError::Unsupported(format!(
            "{file} has no write endpoint, open one of its documents instead"
        ))),
        FileRef::Model {
            action: Some(ModelAction::Other(action)),
            ..
        } => Err(GatewayError::Unsupported(format!(
            "cannot save model action '{action}' of {file}"
        ))),
        other => Ok(read_path(other)),
    }
}

/// Maintenance endpoints, relative to the API base URL
pub fn maintenance_path(task: MaintenanceTask) -> &'static str {
    match task {
        MaintenanceTask::FirstDeploy => {
            "/databases?db_autocreate=true&db_migrate=true&db_fresh=true&db_seed=true"
        }
        MaintenanceTask::GenerateModels => "/models",
        MaintenanceTask::Backup => "/run-backup",
        MaintenanceTask::GenerateMigrations => "/laradev/migration",
    }
}

/// Path used to delete a file. Models are removed together with their
/// migration and controller.
pub fn delete_path(file: &FileRef) -> Result<String, GatewayError> {
    match file {
        FileRef::Model { name, .. } => Ok(format!("/trio/{name}")),
        FileRef::Blade(name) => Ok(format!("/blades/{name}")),
        FileRef::Js(name) => Ok(format!("/javascript/{name}")),
        FileRef::Core(_) => Err(GatewayError::Unsupported(format!(
            "core files cannot be deleted: {file}"
        ))),
    }
}

pub fn operation_path(model: &str, operation: ModelOperation) -> String {
    match operation {
        ModelOperation::Migrate => format!("/migrate/{model}"),
        ModelOperation::Rollback => format!("/migrate/{model}?down=true"),
        ModelOperation::Alter => format!("/migrate/{model}?alter=true"),
        ModelOperation::Truncate => format!("/truncate/{model}"),
    }
}

pub fn last_rows_path(model: &str) -> String {
    format!("/queries10rows/{model}?json=true")
}
