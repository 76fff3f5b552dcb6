//! Make one branch the only and default branch of projects
//!
//! For each project: every branch but the source one is deleted (protection
//! rules are removed first), the target branch is created from the source
//! one, and the source branch becomes the default branch.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};
use crate::platform::{Branch, Platform, Project};
use crate::poll::{Clock, DEFAULT_RATE_LIMIT_PAUSE};
use crate::report::{Action, Outcome, RepoReport, RunReport};

/// Branch kept when none is configured
pub const DEFAULT_SOURCE_BRANCH: &str = "demo";

/// Branch created when none is configured
pub const DEFAULT_TARGET_BRANCH: &str = "demo2";

/// `[promote]` section of the config file
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct PromoteConfig {
    /// Group holding the projects
    pub group: Option<String>,

    /// Branch to keep and make default
    pub source_branch: Option<String>,

    /// Branch to create from the source branch
    pub target_branch: Option<String>,

    /// Set the default branch to the target branch before the source branch
    pub flip_through_target: Option<bool>,
}

/// Resolved promotion settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteSettings {
    /// Branch to keep and make default
    pub source_branch: String,

    /// Branch to create from the source branch
    pub target_branch: String,

    /// Set the default branch to the target branch before the source branch
    pub flip_through_target: bool,

    /// Pause after each protection removal and branch deletion
    pub pause: Duration,
}

impl Default for PromoteSettings {
    fn default() -> Self {
        Self {
            source_branch: DEFAULT_SOURCE_BRANCH.to_string(),
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            flip_through_target: false,
            pause: DEFAULT_RATE_LIMIT_PAUSE,
        }
    }
}

/// Branch promotion workflow
pub struct BranchPromotion<'a> {
    /// Instance holding the projects
    platform: &'a dyn Platform,

    /// Used for the pauses
    clock: &'a dyn Clock,

    /// Branch names and options
    settings: PromoteSettings,
}

impl<'a> BranchPromotion<'a> {
    /// Create the workflow
    pub fn new(platform: &'a dyn Platform, clock: &'a dyn Clock, settings: PromoteSettings) -> Self {
        Self {
            platform,
            clock,
            settings,
        }
    }

    /// Promote the source branch in every project of a group, subgroups included
    /// # Errors
    /// Error if the group or its projects can't be fetched
    pub async fn promote_group(&self, group_path: &str) -> Result<RunReport, GitlabMigrateError> {
        let projects = self.group_projects(group_path).await?;
        let mut run = RunReport::default();
        for project in projects {
            log::info!("{}", "=".repeat(50));
            run.push(self.promote(&project).await);
        }
        Ok(run)
    }

    /// Promote the source branch in one project of a group, found by case-insensitive name
    /// # Errors
    /// Error if the group, the project or its source branch doesn't exist
    pub async fn promote_project(
        &self,
        group_path: &str,
        project_name: &str,
    ) -> Result<RepoReport, GitlabMigrateError> {
        let projects = self.group_projects(group_path).await?;
        let wanted = project_name.to_lowercase();
        let project = projects
            .into_iter()
            .find(|p| p.name.to_lowercase() == wanted)
            .ok_or_else(|| {
                GitlabMigrateError::new(GitlabMigrateErrorKind::ProjectNotFound).with_text(
                    &format!("Project '{project_name}' not found in group '{group_path}'"),
                )
            })?;
        let report = self.promote(&project).await;
        if let Outcome::Skipped(reason) = &report.outcome {
            return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::BranchNotFound)
                .with_text(reason));
        }
        Ok(report)
    }

    /// Fetch the group and list its projects
    async fn group_projects(&self, group_path: &str) -> Result<Vec<Project>, GitlabMigrateError> {
        let group = self.platform.get_group(group_path).await.map_err(|e| {
            log::error!("Target group '{group_path}' not found!");
            e
        })?;
        log::info!("Found target group: {} (ID: {})", group.full_path, group.id);
        let projects = self.platform.list_group_projects(group.id, true).await?;
        log::info!("Found {} projects in group", projects.len());
        Ok(projects)
    }

    /// Promote the source branch in one project, never failing
    pub async fn promote(&self, project: &Project) -> RepoReport {
        let project = match self.platform.get_project(project.id).await {
            Ok(project) => project,
            Err(e) => {
                return RepoReport::new(&project.name).fail(format!("Unable to get project: {e}"))
            }
        };
        log::info!("Processing project: {} (ID: {})", project.name, project.id);
        let mut report = RepoReport::new(&project.name);
        let result = self.run(&project, &mut report).await;
        match result {
            Ok(Outcome::Skipped(reason)) => report.skip(reason),
            Ok(Outcome::Failed(reason)) => report.fail(reason),
            Ok(Outcome::Done) => report,
            Err(e) => report.fail(format!("Critical error processing project: {e}")),
        }
    }

    /// The four steps of the promotion
    async fn run(
        &self,
        project: &Project,
        report: &mut RepoReport,
    ) -> Result<Outcome, GitlabMigrateError> {
        let source_name = self.settings.source_branch.as_str();
        let target_name = self.settings.target_branch.as_str();

        let branches = self.platform.list_branches(project.id).await?;
        log::info!(
            "Found branches: {}",
            branches
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let Some(source) = branches.iter().find(|b| b.name == source_name).cloned() else {
            return Ok(Outcome::Skipped(format!(
                "'{source_name}' branch not found"
            )));
        };

        let to_delete: Vec<&Branch> = branches
            .iter()
            .filter(|b| b.name != source_name)
            .filter(|b| !(b.name == target_name && same_commit(b, &source)))
            .collect();
        let mut default_branch = project.default_branch.clone();
        if let Some(current) = default_branch.clone() {
            if to_delete.iter().any(|b| b.name == current) {
                log::info!("Moving the default branch off '{current}' before deleting it");
                let outcome = self.set_default(project.id, source_name).await;
                if !outcome.is_failed() {
                    default_branch = Some(source_name.to_string());
                }
                report.record(Action::SetDefaultBranch, source_name, outcome);
            }
        }
        if to_delete.is_empty() {
            log::info!("No branches to delete");
        } else {
            log::info!("Deleting {} branches...", to_delete.len());
        }
        for branch in to_delete {
            if branch.protected {
                self.remove_protection(project.id, &branch.name, report)
                    .await;
            }
            let outcome = match self.platform.delete_branch(project.id, &branch.name).await {
                Ok(()) => Outcome::Done,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            report.record(Action::DeleteBranch, &branch.name, outcome);
            self.clock.sleep(self.settings.pause).await;
        }

        let remaining = self.platform.list_branches(project.id).await?;
        let mut target_exists = remaining.iter().any(|b| b.name == target_name);
        if target_exists {
            report.record(
                Action::CreateBranch,
                target_name,
                Outcome::Skipped("already exists".to_string()),
            );
        } else {
            let reference = remaining
                .iter()
                .find(|b| b.name == source_name)
                .and_then(|b| b.commit.clone())
                .unwrap_or_else(|| source_name.to_string());
            let outcome = match self
                .platform
                .create_branch(project.id, target_name, &reference)
                .await
            {
                Ok(_) => {
                    target_exists = true;
                    Outcome::Done
                }
                Err(e) => Outcome::Failed(e.to_string()),
            };
            report.record(Action::CreateBranch, target_name, outcome);
        }

        if default_branch.as_deref() == Some(source_name) {
            if project.default_branch.as_deref() == Some(source_name) {
                report.record(
                    Action::SetDefaultBranch,
                    source_name,
                    Outcome::Skipped("already the default branch".to_string()),
                );
            }
            return Ok(Outcome::Done);
        }
        if self.settings.flip_through_target && target_exists {
            let outcome = self.set_default(project.id, target_name).await;
            report.record(Action::SetDefaultBranch, target_name, outcome);
        }
        let outcome = self.set_default(project.id, source_name).await;
        report.record(Action::SetDefaultBranch, source_name, outcome);
        Ok(Outcome::Done)
    }

    /// Point the default branch of a project at `branch`
    async fn set_default(&self, project_id: u64, branch: &str) -> Outcome {
        match self.platform.set_default_branch(project_id, branch).await {
            Ok(_) => Outcome::Done,
            Err(e) => {
                log::warn!("You may need to manually set the default branch in the GitLab UI");
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Delete the protection rule of a branch, recording what happened
    async fn remove_protection(&self, project_id: u64, branch: &str, report: &mut RepoReport) {
        let rules = match self.platform.list_protected_branches(project_id).await {
            Ok(rules) => rules,
            Err(e) => {
                report.record(Action::Unprotect, branch, Outcome::Failed(e.to_string()));
                return;
            }
        };
        if !rules.iter().any(|rule| rule.name == branch) {
            report.record(
                Action::Unprotect,
                branch,
                Outcome::Skipped("no rule with this name".to_string()),
            );
            return;
        }
        let outcome = match self.platform.unprotect_branch(project_id, branch).await {
            Ok(()) => Outcome::Done,
            Err(e) => Outcome::Failed(e.to_string()),
        };
        report.record(Action::Unprotect, branch, outcome);
        self.clock.sleep(self.settings.pause).await;
    }
}

/// Whether both branches point at the same known commit
fn same_commit(a: &Branch, b: &Branch) -> bool {
    a.commit.is_some() && a.commit == b.commit
}
