//! Import local archives into a group
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};
use crate::export::ARCHIVE_EXTENSION;
use crate::platform::{Group, ImportRequest, ImportStatus, Platform, Project};
use crate::poll::{poll_until, Clock, PollPolicy, PollState};
use crate::report::{Action, Outcome, RepoReport, RunReport};

/// `[import]` section of the config file
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Group the projects are imported into
    pub group: Option<String>,

    /// Directory holding the archives
    pub directory: Option<String>,

    /// Only import these projects (archive names without extension)
    pub projects: Option<Vec<String>>,

    /// Overwrite projects with the same path
    pub overwrite: Option<bool>,
}

/// Which archives to import
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArchiveSelection {
    /// Every archive of the directory
    #[default]
    All,
    /// Only the archives of these projects
    Only(Vec<String>),
}

/// Archive to import
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    /// Project name, archive name without extension
    name: String,

    /// Archive path, none when the archive is missing
    archive: Option<PathBuf>,
}

/// Import workflow
pub struct ProjectImport<'a> {
    /// Destination instance
    platform: &'a dyn Platform,

    /// Used between status checks
    clock: &'a dyn Clock,

    /// Status checks policy
    policy: PollPolicy,

    /// Overwrite projects with the same path
    overwrite: bool,
}

impl<'a> ProjectImport<'a> {
    /// Create the workflow
    pub fn new(
        platform: &'a dyn Platform,
        clock: &'a dyn Clock,
        policy: PollPolicy,
        overwrite: bool,
    ) -> Self {
        Self {
            platform,
            clock,
            policy,
            overwrite,
        }
    }

    /// Import the selected archives of `directory` into the group at `group_path`
    /// # Errors
    /// Error if the group doesn't exist or the directory can't be read
    pub async fn import_archives(
        &self,
        group_path: &str,
        directory: &Path,
        selection: &ArchiveSelection,
    ) -> Result<RunReport, GitlabMigrateError> {
        let group = self.platform.get_group(group_path).await.map_err(|e| {
            log::error!("Target group '{group_path}' not found!");
            e
        })?;
        log::info!("Found target group: {} (ID: {})", group.full_path, group.id);
        let candidates = list_candidates(directory, selection)?;
        log::info!(
            "Found {} export files to import into '{}'",
            candidates.len(),
            group.full_path
        );
        let existing = self.platform.list_group_projects(group.id, false).await?;

        let mut run = RunReport::default();
        for candidate in candidates {
            log::info!("{}", "=".repeat(50));
            log::info!("Importing project: {}", candidate.name);
            let report = RepoReport::new(&candidate.name);
            let Some(archive) = candidate.archive else {
                run.push(report.fail(format!(
                    "Export file not found: {}{ARCHIVE_EXTENSION}",
                    candidate.name
                )));
                continue;
            };
            if existing
                .iter()
                .any(|p| p.path == candidate.name || p.name == candidate.name)
            {
                run.push(report.skip(format!(
                    "project already exists in {}",
                    group.full_path
                )));
                continue;
            }
            let mut report = report;
            let result = self
                .import_one(&group, &candidate.name, &archive, &mut report)
                .await;
            run.push(match result {
                Ok(()) => report,
                Err(e) => report.fail(format!(
                    "Critical error importing '{}': {e}",
                    candidate.name
                )),
            });
        }
        Ok(run)
    }

    /// Upload one archive and wait for the import to end
    async fn import_one(
        &self,
        group: &Group,
        name: &str,
        archive: &Path,
        report: &mut RepoReport,
    ) -> Result<(), GitlabMigrateError> {
        let started = self
            .platform
            .import_project(ImportRequest {
                archive,
                path: name,
                namespace: group,
                overwrite: self.overwrite,
            })
            .await?;
        log::info!("Import started with ID: {}", started.id);

        let platform = self.platform;
        let project_id = started.id;
        let what = format!("import of {name}");
        let polled = poll_until(&self.policy, self.clock, &what, move || async move {
            let project = platform.get_project(project_id).await?;
            let state = if project.import_status.is_final() {
                PollState::Ready(project)
            } else {
                PollState::Pending(format!(
                    "{} | Namespace: {}",
                    project.import_status,
                    namespace_or_unknown(&project)
                ))
            };
            Ok::<_, GitlabMigrateError>(state)
        })
        .await?;

        let project = polled.value;
        let outcome = match project.import_status {
            ImportStatus::Finished if project.namespace.full_path == group.full_path => {
                log::info!("Project imported successfully to {}!", group.full_path);
                Outcome::Done
            }
            ImportStatus::Finished => Outcome::Failed(format!(
                "imported to wrong namespace: {}",
                namespace_or_unknown(&project)
            )),
            _ => Outcome::Failed(format!(
                "import failed: {}",
                project.import_error.as_deref().unwrap_or("Unknown")
            )),
        };
        report.record(Action::Import, name, outcome);
        Ok(())
    }
}

/// Namespace full path, for display
fn namespace_or_unknown(project: &Project) -> &str {
    if project.namespace.full_path.is_empty() {
        "Unknown"
    } else {
        &project.namespace.full_path
    }
}

/// Archives to import, sorted by name
fn list_candidates(
    directory: &Path,
    selection: &ArchiveSelection,
) -> Result<Vec<Candidate>, GitlabMigrateError> {
    match selection {
        ArchiveSelection::All => {
            let entries = std::fs::read_dir(directory).map_err(|e| {
                GitlabMigrateError::new(GitlabMigrateErrorKind::Io)
                    .with_text(&format!("Unable to read {}", directory.display()))
                    .with_source(e)
            })?;
            let mut candidates = vec![];
            for entry in entries {
                let path = entry?.path();
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Some(name) = file_name.strip_suffix(ARCHIVE_EXTENSION) {
                    candidates.push(Candidate {
                        name: name.to_string(),
                        archive: Some(path.clone()),
                    });
                }
            }
            candidates.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(candidates)
        }
        ArchiveSelection::Only(names) => Ok(names
            .iter()
            .map(|name| {
                let path = directory.join(format!("{name}{ARCHIVE_EXTENSION}"));
                Candidate {
                    name: name.clone(),
                    archive: path.is_file().then_some(path),
                }
            })
            .collect()),
    }
}
