//! Gitlab configuration
use super::platform::GitlabPlatform;
use crate::config::GitlabMigrateConfig;
use crate::errors::GitlabMigrateError;
use crate::utils::{token_from_env, Direction};
use crate::{config_password_wrap, config_value_wrap};
use serde::{Deserialize, Serialize};

/// Gitlab instance configuration
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Url of the instance
    pub url: Option<String>,

    /// Access token with the `api` scope
    pub token: Option<String>,
}

impl HostConfig {
    /// Get the Gitlab platform of the given side, asking for missing values
    /// # Errors
    /// Error if a value can't be read or if the url is invalid
    pub fn get_plateform(
        config: &mut GitlabMigrateConfig,
        direction: Direction,
    ) -> Result<GitlabPlatform, GitlabMigrateError> {
        let (url, token) = match direction {
            Direction::Source => {
                let url = config_value_wrap!(
                    config,
                    source,
                    HostConfig,
                    url,
                    "the url of the source gitlab (e.g. https://gitlab.example.com)"
                );
                let token = match token_from_env(direction) {
                    Some(token) => token,
                    None => config_password_wrap!(
                        config,
                        source,
                        HostConfig,
                        token,
                        "your source gitlab token (User settings > Access tokens, scope api)"
                    ),
                };
                (url, token)
            }
            Direction::Destination => {
                let url = config_value_wrap!(
                    config,
                    destination,
                    HostConfig,
                    url,
                    "the url of the destination gitlab (e.g. https://gitlab.example.com)"
                );
                let token = match token_from_env(direction) {
                    Some(token) => token,
                    None => config_password_wrap!(
                        config,
                        destination,
                        HostConfig,
                        token,
                        "your destination gitlab token (User settings > Access tokens, scope api)"
                    ),
                };
                (url, token)
            }
        };
        GitlabPlatform::new(&url, token)
    }
}
