//! Configuration handling
use std::{
    fs::{create_dir_all, read_to_string, File},
    io::Write,
    path::{Path, PathBuf},
};

use home::home_dir;
use serde::{Deserialize, Serialize};

use crate::{
    cleanup::CleanupConfig, cli::GitlabMigrateCli, errors::GitlabMigrateError,
    export::ExportConfig, gitlab::config::HostConfig, import::ImportConfig, poll::PollingConfig,
    promote::PromoteConfig,
};

/// Configuration data
#[derive(Default, Clone, Debug)]
pub struct GitlabMigrateConfig {
    /// path to the configuration file
    pub config_path: PathBuf,

    /// actual configuration data
    pub config_data: ConfigData,

    /// CLI arguments
    pub cli_args: GitlabMigrateCli,
}

/// Content of the configuration file
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
pub struct ConfigData {
    /// Instance the projects are exported from
    pub source: Option<HostConfig>,

    /// Instance the projects are imported into and cleaned up
    pub destination: Option<HostConfig>,

    /// Export settings
    pub export: Option<ExportConfig>,

    /// Import settings
    pub import: Option<ImportConfig>,

    /// Cleanup settings
    pub cleanup: Option<CleanupConfig>,

    /// Branch promotion settings
    pub promote: Option<PromoteConfig>,

    /// Polling settings
    pub polling: Option<PollingConfig>,
}

impl GitlabMigrateConfig {
    /// Create a new Config object from the path given on the command line, or the default one
    /// # Errors
    /// Error if the config file can't be opened or parsed
    pub fn try_new(cli_args: GitlabMigrateCli) -> Result<Self, GitlabMigrateError> {
        let config_path = match cli_args.config.clone() {
            Some(p) => p,
            None => Self::get_config_path()?,
        };
        Self::from_path(cli_args, config_path)
    }

    /// Create a new Config object from a given file
    /// # Errors
    /// Error if the config file can't be opened or parsed
    pub fn from_path(
        cli_args: GitlabMigrateCli,
        config_path: PathBuf,
    ) -> Result<Self, GitlabMigrateError> {
        let contents = read_to_string(&config_path).map_err(|e| {
            GitlabMigrateError::new_with_source(
                &format!("Unable to open {}", config_path.display()),
                e,
            )
        })?;
        let config_data = toml::from_str(&contents)?;
        Ok(GitlabMigrateConfig {
            config_path,
            config_data,
            cli_args,
        })
    }

    /// Save the config data to the config file
    /// # Errors
    /// Error if the config file can't be created or written to
    pub fn save(&self) -> Result<(), GitlabMigrateError> {
        let config_str = toml::to_string(&self.config_data)
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to serialize config", e))?;
        let mut file = File::create(&self.config_path)
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to create config file", e))?;
        file.write_all(config_str.as_bytes())
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to write to config file", e))
    }

    /// Get the path to the config file, creating an empty one if needed
    /// # Errors
    /// Error if the home directory can't be found
    pub fn get_config_path() -> Result<PathBuf, GitlabMigrateError> {
        let home_dir = match home_dir() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err("Unable to get your home dir! home::home_dir() isn't working".into()),
        };
        let config_directory = home_dir.join(".config").join(".gitlab-migrate");
        let config_path = config_directory.join("config.toml");
        create_dir_all(&config_directory)
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to create config dir", e))?;
        ensure_file(&config_path)?;
        Ok(config_path)
    }

    /// Update the config data and save it to the config file
    /// # Errors
    /// Error if fail to save config
    pub fn update(
        &mut self,
        updater_fn: impl FnOnce(&mut ConfigData),
    ) -> Result<(), GitlabMigrateError> {
        updater_fn(&mut self.config_data);
        self.save()
    }
}

/// Create an empty file if it doesn't exist
fn ensure_file(path: &Path) -> Result<(), GitlabMigrateError> {
    if !path.exists() {
        let mut file = File::create(path)
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to create config file", e))?;
        file.write_all(b"")
            .map_err(|e| GitlabMigrateError::new_with_source("Unable to write to config file", e))?;
    }
    Ok(())
}
