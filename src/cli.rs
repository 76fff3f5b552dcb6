//! Command line options for the gitlab-migrate tool
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::cleanup::cleanup_namespaces;
use crate::config::GitlabMigrateConfig;
use crate::errors::GitlabMigrateError;
use crate::export::{export_group, ExportConfig};
use crate::import::{ArchiveSelection, ImportConfig, ProjectImport};
use crate::poll::{PollingConfig, TokioClock};
use crate::promote::{
    BranchPromotion, PromoteConfig, PromoteSettings, DEFAULT_SOURCE_BRANCH, DEFAULT_TARGET_BRANCH,
};
use crate::report::RunReport;
use crate::utils::{get_plateform, yes_no_input, Direction};
use crate::config_value_wrap;

/// gitlab-migrate - Export, import, clean up and promote branches of GitLab projects
#[derive(Parser, Default, Clone, Debug)]
#[command(version)]
pub struct GitlabMigrateCli {
    /// Task to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Custom configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show the current config path
    #[arg(long)]
    pub show_config_path: bool,

    /// Don't ask for confirmation before deleting
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Verbose mode (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Tasks
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Export every project of a source group to local archives
    Export(ExportArgs),

    /// Import archives into a destination group
    Import(ImportArgs),

    /// Delete projects that landed in a wrong namespace
    Cleanup(CleanupArgs),

    /// Make one branch the only and default branch of projects
    Promote(PromoteArgs),
}

/// `export` options
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportArgs {
    /// Path of the group to export (subgroups included)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Directory the archives are written to
    #[arg(short, long)]
    pub dir: Option<String>,
}

/// `import` options
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportArgs {
    /// Path of the destination group
    #[arg(short, long)]
    pub group: Option<String>,

    /// Directory holding the archives
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Only import this project (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Overwrite projects with the same path
    #[arg(long)]
    pub overwrite: bool,
}

/// `cleanup` options
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupArgs {
    /// Namespace path whose projects are deleted (repeatable)
    #[arg(short, long = "namespace", value_name = "PATH")]
    pub namespaces: Vec<String>,
}

/// `promote` options
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct PromoteArgs {
    /// Path of the group holding the projects
    #[arg(short, long)]
    pub group: Option<String>,

    /// Only process this project (case-insensitive name)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Branch to keep and make default [default: demo]
    #[arg(long)]
    pub source_branch: Option<String>,

    /// Branch to create from the source branch [default: demo2]
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Set the default branch to the target branch first
    #[arg(long)]
    pub flip_through_target: bool,
}

/// Run the gitlab-migrate tool with the provided command line options
/// # Errors
/// Error if the configuration is invalid, or if a group or project can't be found
pub async fn gitlab_migrate_main(args: GitlabMigrateCli) -> Result<(), GitlabMigrateError> {
    dotenv::dotenv().ok();
    let mut config = GitlabMigrateConfig::try_new(args)?;
    if config.cli_args.show_config_path {
        println!("{}", config.config_path.display());
        return Ok(());
    }
    let command = match config.cli_args.command.clone() {
        Some(command) => command,
        None => return Err("No command given, see --help".into()),
    };
    let run = match command {
        Command::Export(args) => run_export(&mut config, args).await?,
        Command::Import(args) => run_import(&mut config, args).await?,
        Command::Cleanup(args) => run_cleanup(&mut config, args).await?,
        Command::Promote(args) => run_promote(&mut config, args).await?,
    };
    for report in run.repos.iter().filter(|r| r.has_failures()) {
        log::warn!("{}: {}", report.repo, report.outcome);
        for step in report.steps.iter().filter(|s| s.outcome.is_failed()) {
            log::warn!("  {} '{}': {}", step.action, step.subject, step.outcome);
        }
    }
    println!("Finished: {}", run.summary());
    Ok(())
}

/// Polling section of the config, defaults filled in
fn polling(config: &GitlabMigrateConfig) -> PollingConfig {
    config.config_data.polling.clone().unwrap_or_default()
}

/// `export` subcommand
async fn run_export(
    config: &mut GitlabMigrateConfig,
    args: ExportArgs,
) -> Result<RunReport, GitlabMigrateError> {
    let platform = get_plateform(config, Direction::Source)?;
    let group = match args.group {
        Some(group) => group,
        None => config_value_wrap!(
            config,
            export,
            ExportConfig,
            group,
            "the path of the group to export"
        ),
    };
    let directory = match args.dir {
        Some(dir) => dir,
        None => config_value_wrap!(
            config,
            export,
            ExportConfig,
            directory,
            "the directory to write the archives to"
        ),
    };
    let policy = polling(config).policy();
    export_group(&platform, &TokioClock, &policy, &group, Path::new(&directory)).await
}

/// Archives selected by the command line, then by the config
fn archive_selection(only: Vec<String>, config: Option<&ImportConfig>) -> ArchiveSelection {
    if !only.is_empty() {
        return ArchiveSelection::Only(only);
    }
    match config.and_then(|c| c.projects.clone()) {
        Some(projects) if !projects.is_empty() => ArchiveSelection::Only(projects),
        _ => ArchiveSelection::All,
    }
}

/// `import` subcommand
async fn run_import(
    config: &mut GitlabMigrateConfig,
    args: ImportArgs,
) -> Result<RunReport, GitlabMigrateError> {
    let platform = get_plateform(config, Direction::Destination)?;
    let group = match args.group {
        Some(group) => group,
        None => config_value_wrap!(
            config,
            import,
            ImportConfig,
            group,
            "the path of the group to import into"
        ),
    };
    let directory = match args.dir {
        Some(dir) => dir,
        None => config_value_wrap!(
            config,
            import,
            ImportConfig,
            directory,
            "the directory holding the archives"
        ),
    };
    let import_config = config.config_data.import.clone();
    let selection = archive_selection(args.only, import_config.as_ref());
    let overwrite = args.overwrite
        || import_config
            .as_ref()
            .and_then(|c| c.overwrite)
            .unwrap_or(false);
    let workflow = ProjectImport::new(&platform, &TokioClock, polling(config).policy(), overwrite);
    workflow
        .import_archives(&group, Path::new(&directory), &selection)
        .await
}

/// `cleanup` subcommand
async fn run_cleanup(
    config: &mut GitlabMigrateConfig,
    args: CleanupArgs,
) -> Result<RunReport, GitlabMigrateError> {
    let namespaces = if args.namespaces.is_empty() {
        config
            .config_data
            .cleanup
            .clone()
            .unwrap_or_default()
            .namespaces()
    } else {
        args.namespaces
    };
    let platform = get_plateform(config, Direction::Destination)?;
    let question = format!(
        "Delete every project of the namespaces {}? (y/n)",
        namespaces.join(", ")
    );
    if !config.cli_args.yes && !yes_no_input(question)? {
        log::info!("Cleanup cancelled");
        return Ok(RunReport::default());
    }
    cleanup_namespaces(&platform, &namespaces).await
}

/// Promotion settings from the command line, then the config
fn promote_settings(
    args: &PromoteArgs,
    config: Option<&PromoteConfig>,
    polling: &PollingConfig,
) -> PromoteSettings {
    let source_branch = args
        .source_branch
        .clone()
        .or_else(|| config.and_then(|c| c.source_branch.clone()))
        .unwrap_or_else(|| DEFAULT_SOURCE_BRANCH.to_string());
    let target_branch = args
        .target_branch
        .clone()
        .or_else(|| config.and_then(|c| c.target_branch.clone()))
        .unwrap_or_else(|| DEFAULT_TARGET_BRANCH.to_string());
    let flip_through_target = args.flip_through_target
        || config
            .and_then(|c| c.flip_through_target)
            .unwrap_or(false);
    PromoteSettings {
        source_branch,
        target_branch,
        flip_through_target,
        pause: polling.rate_limit_pause(),
    }
}

/// `promote` subcommand
async fn run_promote(
    config: &mut GitlabMigrateConfig,
    args: PromoteArgs,
) -> Result<RunReport, GitlabMigrateError> {
    let platform = get_plateform(config, Direction::Destination)?;
    let group = match args.group.clone() {
        Some(group) => group,
        None => config_value_wrap!(
            config,
            promote,
            PromoteConfig,
            group,
            "the path of the group holding the projects"
        ),
    };
    let settings = promote_settings(
        &args,
        config.config_data.promote.as_ref(),
        &polling(config),
    );
    log::info!("Target group: {group}");
    let scope = match &args.project {
        Some(project) => format!("project '{project}'"),
        None => format!("every project of '{group}'"),
    };
    let question = format!(
        "Delete every branch but '{}' in {scope}? (y/n)",
        settings.source_branch
    );
    if !config.cli_args.yes && !yes_no_input(question)? {
        log::info!("Promotion cancelled");
        return Ok(RunReport::default());
    }
    let workflow = BranchPromotion::new(&platform, &TokioClock, settings);
    match &args.project {
        Some(project) => {
            let report = workflow.promote_project(&group, project).await?;
            Ok(RunReport {
                repos: vec![report],
            })
        }
        None => workflow.promote_group(&group).await,
    }
}
