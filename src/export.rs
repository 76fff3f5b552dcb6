//! Export every project of a group to local archives
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};
use crate::platform::{ExportStatus, Platform, Project};
use crate::poll::{poll_until, Clock, PollPolicy, PollState};
use crate::report::{Action, Outcome, RepoReport, RunReport};

/// Extension of the archives written and read
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// `[export]` section of the config file
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Group to export, subgroups included
    pub group: Option<String>,

    /// Directory the archives are written to
    pub directory: Option<String>,
}

/// Archive path of a project
pub fn archive_path(directory: &Path, project: &Project) -> PathBuf {
    directory.join(format!("{}{ARCHIVE_EXTENSION}", project.path))
}

/// Export every project of `group_path` into `directory`
/// # Errors
/// Error if the group doesn't exist or its projects can't be listed
pub async fn export_group(
    platform: &dyn Platform,
    clock: &dyn Clock,
    policy: &PollPolicy,
    group_path: &str,
    directory: &Path,
) -> Result<RunReport, GitlabMigrateError> {
    let group = platform.get_group(group_path).await.map_err(|e| {
        log::error!("Source group '{group_path}' not found!");
        e
    })?;
    let projects = platform.list_group_projects(group.id, true).await?;
    log::info!(
        "Found {} projects in '{}' to export.",
        projects.len(),
        group.full_path
    );
    tokio::fs::create_dir_all(directory).await.map_err(|e| {
        GitlabMigrateError::new(GitlabMigrateErrorKind::Io)
            .with_text(&format!("Unable to create {}", directory.display()))
            .with_source(e)
    })?;

    let mut run = RunReport::default();
    let mut written: HashSet<PathBuf> = HashSet::new();
    for project in projects {
        log::info!("Exporting project: {}", project.name);
        let mut report = RepoReport::new(&project.name);
        let destination = archive_path(directory, &project);
        if written.contains(&destination) {
            run.push(report.fail(format!(
                "{} was already written by another project of the run",
                destination.display()
            )));
            continue;
        }
        let result =
            export_project(platform, clock, policy, &project, &destination, &mut report).await;
        let report = match result {
            Ok(()) => {
                written.insert(destination);
                report
            }
            Err(e) => report.fail(format!("Failed for {}: {e}", project.name)),
        };
        run.push(report);
    }
    Ok(run)
}

/// Run the export job of one project and download its archive
async fn export_project(
    platform: &dyn Platform,
    clock: &dyn Clock,
    policy: &PollPolicy,
    project: &Project,
    destination: &Path,
    report: &mut RepoReport,
) -> Result<(), GitlabMigrateError> {
    platform.start_export(project.id).await?;
    let what = format!("export of {}", project.name);
    let polled = poll_until(policy, clock, &what, move || async move {
        let state = match platform.export_status(project.id).await? {
            ExportStatus::Finished => PollState::Ready(ExportStatus::Finished),
            ExportStatus::Failed => PollState::Ready(ExportStatus::Failed),
            status => PollState::Pending(status.to_string()),
        };
        Ok::<_, GitlabMigrateError>(state)
    })
    .await?;
    if polled.value == ExportStatus::Failed {
        report.record(
            Action::Export,
            &project.name,
            Outcome::Failed("export job failed".to_string()),
        );
        return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Export)
            .with_text("export job failed"));
    }
    report.record(Action::Export, &project.name, Outcome::Done);

    let written = platform.download_export(project.id, destination).await?;
    log::info!(
        "{} export complete ({written} bytes in {}).",
        project.name,
        destination.display()
    );
    report.record(Action::Download, destination.display().to_string(), Outcome::Done);
    Ok(())
}
