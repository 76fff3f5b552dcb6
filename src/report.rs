//! Per project results of a run
use std::fmt;

/// Result of one action, or of a whole project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Action done
    Done,
    /// Nothing to do, with the reason
    Skipped(String),
    /// Action failed, with the reason
    Failed(String),
}

impl Outcome {
    /// Whether the outcome is a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => write!(f, "done"),
            Outcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            Outcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Remote action done on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Remove a branch protection rule
    Unprotect,
    /// Delete a branch
    DeleteBranch,
    /// Create a branch
    CreateBranch,
    /// Change the default branch
    SetDefaultBranch,
    /// Run an export job
    Export,
    /// Download an export archive
    Download,
    /// Run an import job
    Import,
    /// Delete a project
    DeleteProject,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Action::Unprotect => "unprotect",
            Action::DeleteBranch => "delete branch",
            Action::CreateBranch => "create branch",
            Action::SetDefaultBranch => "set default branch",
            Action::Export => "export",
            Action::Download => "download",
            Action::Import => "import",
            Action::DeleteProject => "delete project",
        };
        write!(f, "{text}")
    }
}

/// One action and how it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// What was attempted
    pub action: Action,

    /// Branch, file or project the action applies to
    pub subject: String,

    /// Result
    pub outcome: Outcome,
}

/// Everything done on one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    /// Project name
    pub repo: String,

    /// Overall result
    pub outcome: Outcome,

    /// Actions, in order
    pub steps: Vec<Step>,
}

impl RepoReport {
    /// New report, done until told otherwise
    pub fn new<S: Into<String>>(repo: S) -> Self {
        Self {
            repo: repo.into(),
            outcome: Outcome::Done,
            steps: vec![],
        }
    }

    /// Record an action, logging failures
    pub fn record<S: Into<String>>(&mut self, action: Action, subject: S, outcome: Outcome) {
        let subject = subject.into();
        match &outcome {
            Outcome::Failed(reason) => {
                log::warn!("{}: {action} '{subject}' failed: {reason}", self.repo)
            }
            Outcome::Skipped(reason) => {
                log::info!("{}: {action} '{subject}' skipped: {reason}", self.repo)
            }
            Outcome::Done => log::info!("{}: {action} '{subject}' done", self.repo),
        }
        self.steps.push(Step {
            action,
            subject,
            outcome,
        });
    }

    /// Mark the whole project as skipped
    pub fn skip<S: Into<String>>(mut self, reason: S) -> Self {
        let reason = reason.into();
        log::info!("{}: skipped, {reason}", self.repo);
        self.outcome = Outcome::Skipped(reason);
        self
    }

    /// Mark the whole project as failed
    pub fn fail<S: Into<String>>(mut self, reason: S) -> Self {
        let reason = reason.into();
        log::error!("{}: {reason}", self.repo);
        self.outcome = Outcome::Failed(reason);
        self
    }

    /// Whether the project or one of its actions failed
    pub fn has_failures(&self) -> bool {
        self.outcome.is_failed() || self.steps.iter().any(|s| s.outcome.is_failed())
    }

    /// Steps of the given action
    pub fn steps_of(&self, action: Action) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.action == action)
    }
}

/// Reports of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One report per project
    pub repos: Vec<RepoReport>,
}

impl RunReport {
    /// Add a project report
    pub fn push(&mut self, report: RepoReport) {
        self.repos.push(report);
    }

    /// Report of a project, by name
    pub fn get(&self, repo: &str) -> Option<&RepoReport> {
        self.repos.iter().find(|r| r.repo == repo)
    }

    /// Count projects per result
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for report in &self.repos {
            if report.has_failures() {
                summary.failed += 1;
            } else if let Outcome::Skipped(_) = report.outcome {
                summary.skipped += 1;
            } else {
                summary.done += 1;
            }
        }
        summary
    }
}

/// Number of projects per result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Projects without failure
    pub done: usize,
    /// Projects skipped
    pub skipped: usize,
    /// Projects with at least one failure
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}
