//! Remote host abstraction and the data it hands back
use std::{fmt, future::Future, path::Path, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::errors::GitlabMigrateError;

/// Future returned by every [`Platform`] call
pub type PlatformFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, GitlabMigrateError>> + Send + 'a>>;

/// Operations needed from the hosting platform
pub trait Platform: Sync + Send {
    /// Find a group by its full path
    fn get_group(&self, full_path: &str) -> PlatformFuture<'_, Group>;

    /// List the projects of a group, optionally including its subgroups
    fn list_group_projects(
        &self,
        group_id: u64,
        include_subgroups: bool,
    ) -> PlatformFuture<'_, Vec<Project>>;

    /// Search projects by name or path
    fn search_projects(&self, search: &str) -> PlatformFuture<'_, Vec<Project>>;

    /// Get a project by id
    fn get_project(&self, project_id: u64) -> PlatformFuture<'_, Project>;

    /// Delete a project
    fn delete_project(&self, project_id: u64) -> PlatformFuture<'_, ()>;

    /// Schedule an export of the project
    fn start_export(&self, project_id: u64) -> PlatformFuture<'_, ()>;

    /// Get the status of the latest export of the project
    fn export_status(&self, project_id: u64) -> PlatformFuture<'_, ExportStatus>;

    /// Download the exported archive to `destination`, returns the number of bytes written
    fn download_export<'a>(
        &'a self,
        project_id: u64,
        destination: &'a Path,
    ) -> PlatformFuture<'a, u64>;

    /// Upload an archive to start an import, returns the new project
    fn import_project<'a>(&'a self, request: ImportRequest<'a>) -> PlatformFuture<'a, Project>;

    /// List every branch of a project
    fn list_branches(&self, project_id: u64) -> PlatformFuture<'_, Vec<Branch>>;

    /// Create `branch` from `reference` (a branch name or a commit id)
    fn create_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
        reference: &'a str,
    ) -> PlatformFuture<'a, Branch>;

    /// Delete a branch
    fn delete_branch<'a>(&'a self, project_id: u64, branch: &'a str) -> PlatformFuture<'a, ()>;

    /// List the protection rules of a project
    fn list_protected_branches(&self, project_id: u64)
        -> PlatformFuture<'_, Vec<ProtectedBranch>>;

    /// Remove the protection rule with the given name
    fn unprotect_branch<'a>(&'a self, project_id: u64, name: &'a str)
        -> PlatformFuture<'a, ()>;

    /// Change the default branch of a project
    fn set_default_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
    ) -> PlatformFuture<'a, Project>;

    /// Base url of the platform
    fn get_remote_url(&self) -> &str;
}

/// Group (namespace) information
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Group {
    /// Group id
    pub id: u64,

    /// Group name
    pub name: String,

    /// Last segment of the path
    pub path: String,

    /// Path including the parent groups
    pub full_path: String,
}

/// Namespace a project lives in
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Namespace {
    /// Namespace id
    pub id: u64,

    /// Last segment of the path
    pub path: String,

    /// Path including the parent groups
    pub full_path: String,
}

/// Project information
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Project {
    /// Project id
    pub id: u64,

    /// Project name
    pub name: String,

    /// Project path (last url segment)
    pub path: String,

    /// Namespace of the project
    pub namespace: Namespace,

    /// Default branch, none for an empty repository
    pub default_branch: Option<String>,

    /// Import status
    pub import_status: ImportStatus,

    /// Import error message, if any
    pub import_error: Option<String>,
}

impl Project {
    /// Show the full name of the project, including its namespace
    pub fn show_full_name(&self) -> String {
        if self.namespace.full_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace.full_path, self.name)
        }
    }
}

/// Branch information
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Branch {
    /// Branch name
    pub name: String,

    /// Whether a protection rule applies to the branch
    pub protected: bool,

    /// Commit the branch points at
    pub commit: Option<String>,
}

/// Protection rule of a branch
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct ProtectedBranch {
    /// Rule id
    pub id: u64,

    /// Protected branch name (or wildcard)
    pub name: String,
}

/// Archive upload parameters
#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    /// Local archive to upload
    pub archive: &'a Path,

    /// Path of the project to create
    pub path: &'a str,

    /// Destination namespace
    pub namespace: &'a Group,

    /// Overwrite a project with the same path
    pub overwrite: bool,
}

/// Status of an export job
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(from = "String", into = "String")]
pub enum ExportStatus {
    /// No export was requested
    #[default]
    None,
    /// Waiting for a worker
    Queued,
    /// Running
    Started,
    /// Archive is being regenerated
    RegenerationInProgress,
    /// Archive can be downloaded
    Finished,
    /// Export failed
    Failed,
    /// Status unknown to this tool
    Other(String),
}

impl ExportStatus {
    /// Whether the export reached a final state
    pub fn is_final(&self) -> bool {
        matches!(self, ExportStatus::Finished | ExportStatus::Failed)
    }
}

impl From<String> for ExportStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "none" => ExportStatus::None,
            "queued" => ExportStatus::Queued,
            "started" => ExportStatus::Started,
            "regeneration_in_progress" => ExportStatus::RegenerationInProgress,
            "finished" => ExportStatus::Finished,
            "failed" => ExportStatus::Failed,
            _ => ExportStatus::Other(s),
        }
    }
}

impl From<ExportStatus> for String {
    fn from(status: ExportStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::None => write!(f, "none"),
            ExportStatus::Queued => write!(f, "queued"),
            ExportStatus::Started => write!(f, "started"),
            ExportStatus::RegenerationInProgress => write!(f, "regeneration_in_progress"),
            ExportStatus::Finished => write!(f, "finished"),
            ExportStatus::Failed => write!(f, "failed"),
            ExportStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Status of an import job
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(from = "String", into = "String")]
pub enum ImportStatus {
    /// Not an imported project
    #[default]
    None,
    /// Waiting for a worker
    Scheduled,
    /// Running
    Started,
    /// Import done
    Finished,
    /// Import failed
    Failed,
    /// Status unknown to this tool
    Other(String),
}

impl ImportStatus {
    /// Whether the import reached a final state
    pub fn is_final(&self) -> bool {
        matches!(self, ImportStatus::Finished | ImportStatus::Failed)
    }
}

impl From<String> for ImportStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "none" => ImportStatus::None,
            "scheduled" => ImportStatus::Scheduled,
            "started" => ImportStatus::Started,
            "finished" => ImportStatus::Finished,
            "failed" => ImportStatus::Failed,
            _ => ImportStatus::Other(s),
        }
    }
}

impl From<ImportStatus> for String {
    fn from(status: ImportStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::None => write!(f, "none"),
            ImportStatus::Scheduled => write!(f, "scheduled"),
            ImportStatus::Started => write!(f, "started"),
            ImportStatus::Finished => write!(f, "finished"),
            ImportStatus::Failed => write!(f, "failed"),
            ImportStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_from_api_strings() {
        assert_eq!(ExportStatus::from("finished".to_string()), ExportStatus::Finished);
        assert_eq!(
            ExportStatus::from("regeneration_in_progress".to_string()),
            ExportStatus::RegenerationInProgress
        );
        assert_eq!(
            ImportStatus::from("unknown_state".to_string()),
            ImportStatus::Other("unknown_state".into())
        );
        assert!(ImportStatus::Failed.is_final());
        assert!(!ExportStatus::Queued.is_final());
    }

    #[test]
    fn full_name_uses_namespace() {
        let project = Project {
            name: "api".into(),
            namespace: Namespace {
                full_path: "back-office/services".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(project.show_full_name(), "back-office/services/api");
    }
}
