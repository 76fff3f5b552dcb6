//! Gitlab platform
use std::path::Path;

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::repo::{
    GitlabBranch, GitlabExport, GitlabGroup, GitlabProject, GitlabProjectEdition,
    GitlabProtectedBranch,
};
use super::{PER_PAGE, TOKEN_HEADER};
use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};
use crate::platform::{
    Branch, ExportStatus, Group, ImportRequest, Platform, PlatformFuture, Project,
    ProtectedBranch,
};

/// Client of one GitLab instance
#[derive(Debug, Clone)]
pub struct GitlabPlatform {
    /// Url as configured
    remote_url: String,

    /// Url of the instance, ending with a slash
    base: Url,

    /// Access token
    token: String,

    /// Shared HTTP client
    client: reqwest::Client,
}

impl GitlabPlatform {
    /// Create a client for the instance at `url`
    /// # Errors
    /// Error if the url is invalid
    pub fn new(url: &str, token: String) -> Result<Self, GitlabMigrateError> {
        let with_scheme = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        let mut base = Url::parse(&with_scheme)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            remote_url: url.to_string(),
            base,
            token,
            client: reqwest::Client::new(),
        })
    }

    /// Url of an API endpoint
    fn api_url(&self, endpoint: &str) -> Result<Url, GitlabMigrateError> {
        Ok(self.base.join(&format!("api/v4/{endpoint}"))?)
    }

    /// Send a GET request and decode the JSON answer
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        not_found: GitlabMigrateErrorKind,
    ) -> Result<T, GitlabMigrateError> {
        let response = self
            .client
            .get(self.api_url(endpoint)?)
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let text = check_response(response, not_found).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch every page of a list endpoint
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        not_found: GitlabMigrateErrorKind,
    ) -> Result<Vec<T>, GitlabMigrateError> {
        let url = self.api_url(endpoint)?;
        let mut page: usize = 1;
        let mut all_items = vec![];
        loop {
            let response = self
                .client
                .get(url.clone())
                .header(TOKEN_HEADER, &self.token)
                .header(ACCEPT, "application/json")
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", &page.to_string())])
                .send()
                .await?;
            let text = check_response(response, not_found.clone()).await?.text().await?;
            let items: Vec<T> = serde_json::from_str(&text)?;
            log::debug!("Requested {endpoint} (page {page}): {}", items.len());
            if items.is_empty() {
                break;
            }
            all_items.extend(items);
            page += 1;
        }
        Ok(all_items)
    }

    /// Send a DELETE request
    async fn delete(
        &self,
        endpoint: &str,
        not_found: GitlabMigrateErrorKind,
    ) -> Result<(), GitlabMigrateError> {
        let response = self
            .client
            .delete(self.api_url(endpoint)?)
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        check_response(response, not_found).await?;
        Ok(())
    }
}

/// Turn a non-success answer into an error carrying the body
async fn check_response(
    response: Response,
    not_found: GitlabMigrateErrorKind,
) -> Result<Response, GitlabMigrateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let kind = if status == StatusCode::NOT_FOUND {
        not_found
    } else {
        GitlabMigrateErrorKind::Api(status.as_u16())
    };
    Err(GitlabMigrateError::new(kind).with_text(&format!("{status}: {text}")))
}

impl Platform for GitlabPlatform {
    fn get_group(&self, full_path: &str) -> PlatformFuture<'_, Group> {
        let endpoint = format!("groups/{}", urlencoding::encode(full_path));
        Box::pin(async move {
            let group: GitlabGroup = self
                .get_json(&endpoint, GitlabMigrateErrorKind::GroupNotFound)
                .await?;
            Ok(group.into())
        })
    }

    fn list_group_projects(
        &self,
        group_id: u64,
        include_subgroups: bool,
    ) -> PlatformFuture<'_, Vec<Project>> {
        Box::pin(async move {
            let endpoint = format!("groups/{group_id}/projects");
            let include_subgroups = include_subgroups.to_string();
            let projects: Vec<GitlabProject> = self
                .get_all_pages(
                    &endpoint,
                    &[("include_subgroups", include_subgroups.as_str())],
                    GitlabMigrateErrorKind::GroupNotFound,
                )
                .await?;
            Ok(projects.into_iter().map(Into::into).collect())
        })
    }

    fn search_projects(&self, search: &str) -> PlatformFuture<'_, Vec<Project>> {
        let search = search.to_string();
        Box::pin(async move {
            let projects: Vec<GitlabProject> = self
                .get_all_pages(
                    "projects",
                    &[("search", search.as_str()), ("search_namespaces", "true")],
                    GitlabMigrateErrorKind::ProjectNotFound,
                )
                .await?;
            Ok(projects.into_iter().map(Into::into).collect())
        })
    }

    fn get_project(&self, project_id: u64) -> PlatformFuture<'_, Project> {
        Box::pin(async move {
            let project: GitlabProject = self
                .get_json(
                    &format!("projects/{project_id}"),
                    GitlabMigrateErrorKind::ProjectNotFound,
                )
                .await?;
            Ok(project.into())
        })
    }

    fn delete_project(&self, project_id: u64) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            self.delete(
                &format!("projects/{project_id}"),
                GitlabMigrateErrorKind::ProjectNotFound,
            )
            .await
        })
    }

    fn start_export(&self, project_id: u64) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url(&format!("projects/{project_id}/export"))?)
                .header(TOKEN_HEADER, &self.token)
                .header(ACCEPT, "application/json")
                .send()
                .await?;
            check_response(response, GitlabMigrateErrorKind::ProjectNotFound).await?;
            Ok(())
        })
    }

    fn export_status(&self, project_id: u64) -> PlatformFuture<'_, ExportStatus> {
        Box::pin(async move {
            let export: GitlabExport = self
                .get_json(
                    &format!("projects/{project_id}/export"),
                    GitlabMigrateErrorKind::ProjectNotFound,
                )
                .await?;
            Ok(export.into())
        })
    }

    fn download_export<'a>(
        &'a self,
        project_id: u64,
        destination: &'a Path,
    ) -> PlatformFuture<'a, u64> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.api_url(&format!("projects/{project_id}/export/download"))?)
                .header(TOKEN_HEADER, &self.token)
                .send()
                .await?;
            let mut response = check_response(response, GitlabMigrateErrorKind::Export).await?;
            let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
                GitlabMigrateError::new(GitlabMigrateErrorKind::Io)
                    .with_text(&format!("Unable to create {}", destination.display()))
                    .with_source(e)
            })?;
            let mut written: u64 = 0;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(written)
        })
    }

    fn import_project<'a>(&'a self, request: ImportRequest<'a>) -> PlatformFuture<'a, Project> {
        Box::pin(async move {
            let file = tokio::fs::File::open(request.archive).await.map_err(|e| {
                GitlabMigrateError::new(GitlabMigrateErrorKind::Io)
                    .with_text(&format!("Unable to open {}", request.archive.display()))
                    .with_source(e)
            })?;
            let length = file.metadata().await?.len();
            let file_name = request
                .archive
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.tar.gz", request.path));
            let part = Part::stream_with_length(reqwest::Body::from(file), length)
                .file_name(file_name);
            let form = Form::new()
                .text("path", request.path.to_string())
                .text("namespace", request.namespace.id.to_string())
                .text("overwrite", request.overwrite.to_string())
                .part("file", part);
            let response = self
                .client
                .post(self.api_url("projects/import")?)
                .header(TOKEN_HEADER, &self.token)
                .header(ACCEPT, "application/json")
                .multipart(form)
                .send()
                .await?;
            let text = check_response(response, GitlabMigrateErrorKind::Import)
                .await?
                .text()
                .await?;
            let project: GitlabProject = serde_json::from_str(&text)?;
            Ok(project.into())
        })
    }

    fn list_branches(&self, project_id: u64) -> PlatformFuture<'_, Vec<Branch>> {
        Box::pin(async move {
            let branches: Vec<GitlabBranch> = self
                .get_all_pages(
                    &format!("projects/{project_id}/repository/branches"),
                    &[],
                    GitlabMigrateErrorKind::ProjectNotFound,
                )
                .await?;
            Ok(branches.into_iter().map(Into::into).collect())
        })
    }

    fn create_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
        reference: &'a str,
    ) -> PlatformFuture<'a, Branch> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url(&format!("projects/{project_id}/repository/branches"))?)
                .header(TOKEN_HEADER, &self.token)
                .header(ACCEPT, "application/json")
                .query(&[("branch", branch), ("ref", reference)])
                .send()
                .await?;
            let text = check_response(response, GitlabMigrateErrorKind::BranchNotFound)
                .await?
                .text()
                .await?;
            let created: GitlabBranch = serde_json::from_str(&text)?;
            Ok(created.into())
        })
    }

    fn delete_branch<'a>(&'a self, project_id: u64, branch: &'a str) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            self.delete(
                &format!(
                    "projects/{project_id}/repository/branches/{}",
                    urlencoding::encode(branch)
                ),
                GitlabMigrateErrorKind::BranchNotFound,
            )
            .await
        })
    }

    fn list_protected_branches(
        &self,
        project_id: u64,
    ) -> PlatformFuture<'_, Vec<ProtectedBranch>> {
        Box::pin(async move {
            let rules: Vec<GitlabProtectedBranch> = self
                .get_all_pages(
                    &format!("projects/{project_id}/protected_branches"),
                    &[],
                    GitlabMigrateErrorKind::ProjectNotFound,
                )
                .await?;
            Ok(rules.into_iter().map(Into::into).collect())
        })
    }

    fn unprotect_branch<'a>(
        &'a self,
        project_id: u64,
        name: &'a str,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            self.delete(
                &format!(
                    "projects/{project_id}/protected_branches/{}",
                    urlencoding::encode(name)
                ),
                GitlabMigrateErrorKind::BranchNotFound,
            )
            .await
        })
    }

    fn set_default_branch<'a>(
        &'a self,
        project_id: u64,
        branch: &'a str,
    ) -> PlatformFuture<'a, Project> {
        Box::pin(async move {
            let response = self
                .client
                .put(self.api_url(&format!("projects/{project_id}"))?)
                .header(TOKEN_HEADER, &self.token)
                .header(ACCEPT, "application/json")
                .json(&GitlabProjectEdition {
                    default_branch: branch.to_string(),
                })
                .send()
                .await?;
            let text = check_response(response, GitlabMigrateErrorKind::ProjectNotFound)
                .await?
                .text()
                .await?;
            let project: GitlabProject = serde_json::from_str(&text)?;
            Ok(project.into())
        })
    }

    fn get_remote_url(&self) -> &str {
        &self.remote_url
    }
}
