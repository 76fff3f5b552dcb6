//! GitLab API payloads and their conversion to the crate types
use serde::{Deserialize, Serialize};

use crate::platform::{
    Branch, ExportStatus, Group, ImportStatus, Namespace, Project, ProtectedBranch,
};

/// Gitlab Group
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabGroup {
    /// Group id
    pub id: u64,

    /// Group name
    pub name: String,

    /// Group path
    pub path: String,

    /// Group path with its parents
    pub full_path: String,
}

/// Namespace embedded in a project
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabNamespace {
    /// Namespace id
    pub id: u64,

    /// Namespace path
    pub path: String,

    /// Namespace path with its parents
    pub full_path: String,
}

/// Gitlab Project
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabProject {
    /// Project id
    pub id: u64,

    /// Project name
    pub name: String,

    /// Project path
    pub path: String,

    /// Project namespace, missing in some import answers
    pub namespace: Option<GitlabNamespace>,

    /// Default branch
    pub default_branch: Option<String>,

    /// Import status
    pub import_status: Option<String>,

    /// Import error
    pub import_error: Option<String>,
}

/// Export status answer
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabExport {
    /// Export status
    pub export_status: String,
}

/// Commit a branch points at
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabCommit {
    /// Commit sha
    pub id: String,
}

/// Gitlab Branch
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabBranch {
    /// Branch name
    pub name: String,

    /// Protected status
    #[serde(default)]
    pub protected: bool,

    /// Last commit
    pub commit: Option<GitlabCommit>,
}

/// Gitlab protected branch rule
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct GitlabProtectedBranch {
    /// Rule id
    pub id: u64,

    /// Branch name or wildcard
    pub name: String,
}

/// Project edition
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GitlabProjectEdition {
    /// New default branch
    pub default_branch: String,
}

impl From<GitlabGroup> for Group {
    fn from(group: GitlabGroup) -> Self {
        Group {
            id: group.id,
            name: group.name,
            path: group.path,
            full_path: group.full_path,
        }
    }
}

impl From<GitlabNamespace> for Namespace {
    fn from(namespace: GitlabNamespace) -> Self {
        Namespace {
            id: namespace.id,
            path: namespace.path,
            full_path: namespace.full_path,
        }
    }
}

impl From<GitlabProject> for Project {
    fn from(project: GitlabProject) -> Self {
        Project {
            id: project.id,
            name: project.name,
            path: project.path,
            namespace: project.namespace.map(Into::into).unwrap_or_default(),
            default_branch: project.default_branch,
            import_status: project
                .import_status
                .map(ImportStatus::from)
                .unwrap_or_default(),
            import_error: project.import_error,
        }
    }
}

impl From<GitlabExport> for ExportStatus {
    fn from(export: GitlabExport) -> Self {
        export.export_status.into()
    }
}

impl From<GitlabBranch> for Branch {
    fn from(branch: GitlabBranch) -> Self {
        Branch {
            name: branch.name,
            protected: branch.protected,
            commit: branch.commit.map(|c| c.id),
        }
    }
}

impl From<GitlabProtectedBranch> for ProtectedBranch {
    fn from(rule: GitlabProtectedBranch) -> Self {
        ProtectedBranch {
            id: rule.id,
            name: rule.name,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn project_from_api_json() {
        let json = r#"{
            "id": 42,
            "name": "Billing",
            "path": "billing",
            "path_with_namespace": "back-office/billing",
            "namespace": {"id": 7, "name": "back-office", "path": "back-office", "kind": "group", "full_path": "back-office"},
            "default_branch": "main",
            "import_status": "started",
            "import_error": null
        }"#;
        let project: Project = serde_json::from_str::<GitlabProject>(json).unwrap().into();
        assert_eq!(project.id, 42);
        assert_eq!(project.namespace.full_path, "back-office");
        assert_eq!(project.default_branch.as_deref(), Some("main"));
        assert_eq!(project.import_status, ImportStatus::Started);
    }

    #[test]
    fn import_answer_without_namespace() {
        let json = r#"{"id": 1, "name": "api", "path": "api", "import_status": "scheduled"}"#;
        let project: Project = serde_json::from_str::<GitlabProject>(json).unwrap().into();
        assert_eq!(project.namespace, Namespace::default());
        assert_eq!(project.import_status, ImportStatus::Scheduled);
    }

    #[test]
    fn branch_keeps_commit_id() {
        let json = r#"{"name": "release-1.0", "protected": true, "default": false, "commit": {"id": "a1b2c3", "short_id": "a1b2"}}"#;
        let branch: Branch = serde_json::from_str::<GitlabBranch>(json).unwrap().into();
        assert!(branch.protected);
        assert_eq!(branch.commit.as_deref(), Some("a1b2c3"));
    }
}
