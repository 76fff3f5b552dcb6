//! Delete projects that landed in a wrong namespace
use serde::{Deserialize, Serialize};

use crate::errors::GitlabMigrateError;
use crate::platform::Platform;
use crate::report::{Action, Outcome, RepoReport, RunReport};

/// Namespaces cleaned when none is configured
pub const DEFAULT_WRONG_NAMESPACES: [&str; 2] = ["root", "Administrator"];

/// `[cleanup]` section of the config file
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Namespace paths whose projects are deleted
    pub namespaces: Option<Vec<String>>,
}

impl CleanupConfig {
    /// Configured namespaces, or the default ones
    pub fn namespaces(&self) -> Vec<String> {
        match &self.namespaces {
            Some(namespaces) => namespaces.clone(),
            None => DEFAULT_WRONG_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        }
    }
}

/// Delete every project whose namespace path is exactly one of `namespaces`
/// # Errors
/// Error if the projects can't be searched
pub async fn cleanup_namespaces(
    platform: &dyn Platform,
    namespaces: &[String],
) -> Result<RunReport, GitlabMigrateError> {
    let mut run = RunReport::default();
    for namespace in namespaces {
        log::info!("Checking projects under namespace: {namespace}");
        let projects = platform.search_projects(namespace).await?;
        for project in projects {
            let full_name = project.show_full_name();
            if project.namespace.path != *namespace {
                log::debug!("Keeping {full_name}, namespace is {}", project.namespace.path);
                continue;
            }
            log::info!("Deleting project: {full_name}");
            let mut report = RepoReport::new(&full_name);
            let outcome = match platform.delete_project(project.id).await {
                Ok(()) => Outcome::Done,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            report.record(Action::DeleteProject, &full_name, outcome);
            run.push(report);
        }
    }
    Ok(run)
}
