//! Error handling for the gitlab-migrate crate.
use std::{error::Error as StdError, fmt};

/// Error type for the gitlab-migrate crate.
#[derive(Debug)]
pub struct GitlabMigrateError {
    /// Inner error.
    inner: Box<Inner>,
}

impl GitlabMigrateError {
    /// Create a new error.
    pub(crate) fn new(kind: GitlabMigrateErrorKind) -> Self {
        Self {
            inner: Box::new(Inner { kind, source: None }),
        }
    }

    /// Create a new error with a source error.
    pub(crate) fn new_with_source<E>(text: &str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::new(GitlabMigrateErrorKind::Platform)
            .with_text(text)
            .with_source(source)
    }

    /// Attach a text as the source of the error.
    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.inner.source = Some(Box::new(std::io::Error::other(text.to_string())));
        self
    }

    /// Attach a source error, keeping any text already attached.
    pub(crate) fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = source.into();
        self.inner.source = Some(match self.inner.source.take() {
            Some(text) => Box::new(std::io::Error::other(format!("{text}: {source}"))),
            None => source,
        });
        self
    }

    /// Kind of the error.
    pub fn kind(&self) -> &GitlabMigrateErrorKind {
        &self.inner.kind
    }

    /// Whether this error means a group, project or branch doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.inner.kind,
            GitlabMigrateErrorKind::GroupNotFound
                | GitlabMigrateErrorKind::ProjectNotFound
                | GitlabMigrateErrorKind::BranchNotFound
        )
    }
}

/// Type alias for a boxed error.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Inner error type for the gitlab-migrate crate.
#[derive(Debug)]
struct Inner {
    /// Error kind.
    kind: GitlabMigrateErrorKind,

    /// Source error.
    source: Option<BoxError>,
}

/// Kind of [`GitlabMigrateError`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitlabMigrateErrorKind {
    /// Generic error, the source holds the details.
    Platform,

    /// Error related to the reqwest crate.
    Reqwest,

    /// Error related to serde.
    Serde,

    /// Error related to the filesystem.
    Io,

    /// Error related to the configuration.
    Config,

    /// The group doesn't exist.
    GroupNotFound,

    /// The project doesn't exist.
    ProjectNotFound,

    /// The branch doesn't exist.
    BranchNotFound,

    /// GitLab answered with a non-success status.
    Api(u16),

    /// A job didn't reach a final state in time.
    PollTimeout,

    /// Error related to the export of a project.
    Export,

    /// Error related to the import of a project.
    Import,
}

impl fmt::Display for GitlabMigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.source {
            Some(source) => write!(f, "{:?}: {source}", self.inner.kind),
            None => write!(f, "{:?}", self.inner.kind),
        }
    }
}

impl StdError for GitlabMigrateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<reqwest::Error> for GitlabMigrateError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(GitlabMigrateErrorKind::Reqwest).with_source(e)
    }
}

impl From<serde_json::Error> for GitlabMigrateError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(GitlabMigrateErrorKind::Serde).with_source(e)
    }
}

impl From<std::io::Error> for GitlabMigrateError {
    fn from(e: std::io::Error) -> Self {
        Self::new(GitlabMigrateErrorKind::Io).with_source(e)
    }
}

impl From<toml::de::Error> for GitlabMigrateError {
    fn from(e: toml::de::Error) -> Self {
        Self::new(GitlabMigrateErrorKind::Config).with_source(e)
    }
}

impl From<url::ParseError> for GitlabMigrateError {
    fn from(e: url::ParseError) -> Self {
        Self::new(GitlabMigrateErrorKind::Config).with_source(e)
    }
}

impl From<&str> for GitlabMigrateError {
    fn from(text: &str) -> Self {
        Self::new(GitlabMigrateErrorKind::Platform).with_text(text)
    }
}

impl From<String> for GitlabMigrateError {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}
