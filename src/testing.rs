//! In-memory GitLab and clock used by the workflow tests
use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::Future,
    path::Path,
    pin::Pin,
    sync::Mutex,
    time::Duration,
};

use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};
use crate::platform::{
    Branch, ExportStatus, Group, ImportRequest, ImportStatus, Namespace, Platform, PlatformFuture,
    Project, ProtectedBranch,
};
use crate::poll::Clock;

/// Clock recording the sleeps instead of waiting
#[derive(Debug, Default)]
pub(crate) struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.sleeps.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

#[derive(Debug, Default)]
struct HostState {
    next_id: u64,
    groups: Vec<Group>,
    projects: Vec<Project>,
    branches: HashMap<u64, Vec<Branch>>,
    protections: HashMap<u64, Vec<ProtectedBranch>>,
    export_statuses: HashMap<u64, VecDeque<ExportStatus>>,
    archives: HashMap<u64, Vec<u8>>,
    import_statuses: VecDeque<ImportStatus>,
    pending_imports: HashMap<u64, VecDeque<ImportStatus>>,
    import_namespace: Option<Namespace>,
    uploads: Vec<(String, Vec<u8>)>,
    failures: HashSet<String>,
    mutations: Vec<String>,
}

impl HostState {
    fn check(&self, key: String) -> Result<(), GitlabMigrateError> {
        if self.failures.contains(&key) {
            return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Api(500))
                .with_text(&format!("injected failure for {key}")));
        }
        Ok(())
    }

    fn project_mut(&mut self, project_id: u64) -> Result<&mut Project, GitlabMigrateError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| GitlabMigrateError::new(GitlabMigrateErrorKind::ProjectNotFound))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Platform`]
#[derive(Debug, Default)]
pub(crate) struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub(crate) fn add_group(&self, full_path: &str) -> Group {
        let mut state = self.state.lock().unwrap();
        let path = full_path.rsplit('/').next().unwrap_or(full_path).to_string();
        let group = Group {
            id: state.next_id(),
            name: path.clone(),
            path,
            full_path: full_path.to_string(),
        };
        state.groups.push(group.clone());
        group
    }

    pub(crate) fn add_project(&self, name: &str, namespace_full_path: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.projects.push(Project {
            id,
            name: name.to_string(),
            path: name.to_lowercase().replace(' ', "-"),
            namespace: namespace(namespace_full_path),
            ..Default::default()
        });
        state.branches.insert(id, vec![]);
        id
    }

    pub(crate) fn add_branch(&self, project_id: u64, name: &str, commit: &str) {
        let mut state = self.state.lock().unwrap();
        state.branches.entry(project_id).or_default().push(Branch {
            name: name.to_string(),
            protected: false,
            commit: Some(commit.to_string()),
        });
    }

    pub(crate) fn protect_branch(&self, project_id: u64, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        if let Some(branch) = state
            .branches
            .entry(project_id)
            .or_default()
            .iter_mut()
            .find(|b| b.name == name)
        {
            branch.protected = true;
        }
        state
            .protections
            .entry(project_id)
            .or_default()
            .push(ProtectedBranch {
                id,
                name: name.to_string(),
            });
    }

    pub(crate) fn set_default(&self, project_id: u64, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Ok(project) = state.project_mut(project_id) {
            project.default_branch = Some(name.to_string());
        }
    }

    /// Statuses returned by the successive export status checks, the last one sticks
    pub(crate) fn script_export(&self, project_id: u64, statuses: &[ExportStatus], archive: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state
            .export_statuses
            .insert(project_id, statuses.iter().cloned().collect());
        state.archives.insert(project_id, archive.to_vec());
    }

    /// Statuses returned by the successive checks of the next imports
    pub(crate) fn script_import(&self, statuses: &[ImportStatus]) {
        self.state.lock().unwrap().import_statuses = statuses.iter().cloned().collect();
    }

    /// Put imported projects in this namespace instead of the requested one
    pub(crate) fn misplace_imports(&self, full_path: &str) {
        self.state.lock().unwrap().import_namespace = Some(namespace(full_path));
    }

    /// Make the call identified by `key` fail, e.g. `delete_branch:feature-x`
    pub(crate) fn fail(&self, key: &str) {
        self.state.lock().unwrap().failures.insert(key.to_string());
    }

    pub(crate) fn branch_names(&self, project_id: u64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .branches
            .get(&project_id)
            .map(|b| b.iter().map(|b| b.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub(crate) fn branch(&self, project_id: u64, name: &str) -> Option<Branch> {
        let state = self.state.lock().unwrap();
        state
            .branches
            .get(&project_id)
            .and_then(|b| b.iter().find(|b| b.name == name).cloned())
    }

    pub(crate) fn project(&self, project_id: u64) -> Option<Project> {
        let state = self.state.lock().unwrap();
        state.projects.iter().find(|p| p.id == project_id).cloned()
    }

    pub(crate) fn project_by_name(&self, name: &str) -> Option<Project> {
        let state = self.state.lock().unwrap();
        state.projects.iter().find(|p| p.name == name).cloned()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Every mutating call, in order
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }
}

fn namespace(full_path: &str) -> Namespace {
    Namespace {
        id: 0,
        path: full_path.rsplit('/').next().unwrap_or(full_path).to_string(),
        full_path: full_path.to_string(),
    }
}

impl Platform for FakeHost {
    fn get_group(&self, full_path: &str) -> PlatformFuture<'_, Group> {
        let full_path = full_path.to_string();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state
                .groups
                .iter()
                .find(|g| g.full_path == full_path)
                .cloned()
                .ok_or_else(|| GitlabMigrateError::new(GitlabMigrateErrorKind::GroupNotFound))
        })
    }

    fn list_group_projects(
        &self,
        group_id: u64,
        include_subgroups: bool,
    ) -> PlatformFuture<'_, Vec<Project>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let group = state
                .groups
                .iter()
                .find(|g| g.id == group_id)
                .ok_or_else(|| GitlabMigrateError::new(GitlabMigrateErrorKind::GroupNotFound))?;
            let prefix = format!("{}/", group.full_path);
            Ok(state
                .projects
                .iter()
                .filter(|p| {
                    p.namespace.full_path == group.full_path
                        || (include_subgroups && p.namespace.full_path.starts_with(&prefix))
                })
                .cloned()
                .collect())
        })
    }

    /// Matches name, path and namespace path, as GitLab does with `search_namespaces=true`
    fn search_projects(&self, search: &str) -> PlatformFuture<'_, Vec<Project>> {
        let search = search.to_lowercase();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .projects
                .iter()
                .filter(|p| {
                    p.name.to_lowercase().contains(&search)
                        || p.path.to_lowercase().contains(&search)
                        || p.namespace.full_path.to_lowercase().contains(&search)
                })
                .cloned()
                .collect())
        })
    }

    fn get_project(&self, project_id: u64) -> PlatformFuture<'_, Project> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let status = state
                .pending_imports
                .get_mut(&project_id)
                .and_then(|statuses| {
                    if statuses.len() > 1 {
                        statuses.pop_front()
                    } else {
                        statuses.front().cloned()
                    }
                });
            let project = state.project_mut(project_id)?;
            if let Some(status) = status {
                if status == ImportStatus::Failed {
                    project.import_error = Some("archive is corrupted".to_string());
                }
                project.import_status = status;
            }
            Ok(project.clone())
        })
    }

    fn delete_project(&self, project_id: u64) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("delete_project:{project_id}"))?;
            state.project_mut(project_id)?;
            state.projects.retain(|p| p.id != project_id);
            state.mutations.push(format!("delete_project:{project_id}"));
            Ok(())
        })
    }

    fn start_export(&self, project_id: u64) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("export:{project_id}"))?;
            state.project_mut(project_id)?;
            state.mutations.push(format!("export:{project_id}"));
            Ok(())
        })
    }

    fn export_status(&self, project_id: u64) -> PlatformFuture<'_, ExportStatus> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let statuses = state.export_statuses.entry(project_id).or_default();
            let status = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            Ok(status.unwrap_or(ExportStatus::Finished))
        })
    }

    fn download_export<'a>(
        &'a self,
        project_id: u64,
        destination: &'a Path,
    ) -> PlatformFuture<'a, u64> {
        Box::pin(async move {
            let archive = {
                let state = self.state.lock().unwrap();
                state.check(format!("download:{project_id}"))?;
                state.archives.get(&project_id).cloned().unwrap_or_default()
            };
            tokio::fs::write(destination, &archive).await?;
            Ok(archive.len() as u64)
        })
    }

    fn import_project<'a>(&'a self, request: ImportRequest<'a>) -> PlatformFuture<'a, Project> {
        Box::pin(async move {
            let content = tokio::fs::read(request.archive).await?;
            let mut state = self.state.lock().unwrap();
            state.check(format!("import:{}", request.path))?;
            let id = state.next_id();
            let namespace = match &state.import_namespace {
                Some(ns) => ns.clone(),
                None => namespace(&request.namespace.full_path),
            };
            let mut statuses = state.import_statuses.clone();
            if statuses.is_empty() {
                statuses.push_back(ImportStatus::Finished);
            }
            let project = Project {
                id,
                name: request.path.to_string(),
                path: request.path.to_string(),
                namespace,
                import_status: ImportStatus::Scheduled,
                ..Default::default()
            };
            state.projects.push(project.clone());
            state.pending_imports.insert(id, statuses);
            state.uploads.push((request.path.to_string(), content));
            state.mutations.push(format!("import:{}", request.path));
            Ok(project)
        })
    }

    fn list_branches(&self, project_id: u64) -> PlatformFuture<'_, Vec<Branch>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check(format!("list_branches:{project_id}"))?;
            Ok(state.branches.get(&project_id).cloned().unwrap_or_default())
        })
    }

    fn create_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
        reference: &'a str,
    ) -> PlatformFuture<'a, Branch> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("create_branch:{branch}"))?;
            let branches = state.branches.entry(project_id).or_default();
            if branches.iter().any(|b| b.name == branch) {
                return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Api(400))
                    .with_text("Branch already exists"));
            }
            let commit = branches
                .iter()
                .find(|b| b.name == reference || b.commit.as_deref() == Some(reference))
                .and_then(|b| b.commit.clone())
                .ok_or_else(|| GitlabMigrateError::new(GitlabMigrateErrorKind::BranchNotFound))?;
            let created = Branch {
                name: branch.to_string(),
                protected: false,
                commit: Some(commit),
            };
            branches.push(created.clone());
            state.mutations.push(format!("create_branch:{branch}"));
            Ok(created)
        })
    }

    fn delete_branch<'a>(&'a self, project_id: u64, branch: &'a str) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("delete_branch:{branch}"))?;
            let protected = state
                .protections
                .get(&project_id)
                .is_some_and(|rules| rules.iter().any(|r| r.name == branch));
            if protected {
                return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Api(403))
                    .with_text("Protected branch cant be removed"));
            }
            let is_default = state
                .projects
                .iter()
                .any(|p| p.id == project_id && p.default_branch.as_deref() == Some(branch));
            if is_default {
                return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Api(405))
                    .with_text("Cannot remove HEAD branch"));
            }
            let branches = state.branches.entry(project_id).or_default();
            let before = branches.len();
            branches.retain(|b| b.name != branch);
            if branches.len() == before {
                return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::BranchNotFound));
            }
            state.mutations.push(format!("delete_branch:{branch}"));
            Ok(())
        })
    }

    fn list_protected_branches(
        &self,
        project_id: u64,
    ) -> PlatformFuture<'_, Vec<ProtectedBranch>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .protections
                .get(&project_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn unprotect_branch<'a>(
        &'a self,
        project_id: u64,
        name: &'a str,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("unprotect:{name}"))?;
            state
                .protections
                .entry(project_id)
                .or_default()
                .retain(|r| r.name != name);
            if let Some(branch) = state
                .branches
                .entry(project_id)
                .or_default()
                .iter_mut()
                .find(|b| b.name == name)
            {
                branch.protected = false;
            }
            state.mutations.push(format!("unprotect:{name}"));
            Ok(())
        })
    }

    fn set_default_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
    ) -> PlatformFuture<'a, Project> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check(format!("set_default_branch:{branch}"))?;
            let exists = state
                .branches
                .get(&project_id)
                .is_some_and(|b| b.iter().any(|b| b.name == branch));
            if !exists {
                return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::Api(400))
                    .with_text("default_branch does not exist"));
            }
            state.mutations.push(format!("set_default_branch:{branch}"));
            let project = state.project_mut(project_id)?;
            project.default_branch = Some(branch.to_string());
            Ok(project.clone())
        })
    }

    fn get_remote_url(&self) -> &str {
        "https://gitlab.test"
    }
}
