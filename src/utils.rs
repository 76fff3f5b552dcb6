//! Utility functions
use std::{env, fmt};

use crate::config::GitlabMigrateConfig;
use crate::errors::GitlabMigrateError;
use crate::gitlab::config::HostConfig;
use crate::gitlab::platform::GitlabPlatform;
use crate::platform::Platform;

/// Which instance to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Instance projects are exported from
    Source,
    /// Instance projects are imported into
    Destination,
}

impl Direction {
    /// Environment variable overriding the token
    pub fn token_env(&self) -> &'static str {
        match self {
            Direction::Source => "GITLAB_MIGRATE_SOURCE_TOKEN",
            Direction::Destination => "GITLAB_MIGRATE_DESTINATION_TOKEN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Source => write!(f, "source"),
            Direction::Destination => write!(f, "destination"),
        }
    }
}

/// Token from the environment, if set
pub(crate) fn token_from_env(direction: Direction) -> Option<String> {
    env::var(direction.token_env())
        .ok()
        .filter(|token| !token.trim().is_empty())
}

/// Get the platform to use
/// # Errors
/// Error if a missing value can't be read, or if the url is invalid
pub(crate) fn get_plateform(
    config: &mut GitlabMigrateConfig,
    direction: Direction,
) -> Result<GitlabPlatform, GitlabMigrateError> {
    let platform = HostConfig::get_plateform(config, direction)?;
    log::info!("Using {} as {direction}", platform.get_remote_url());
    Ok(platform)
}

/// Get input from the user
pub(crate) fn input() -> Result<String, GitlabMigrateError> {
    use std::io::{stdin, stdout, Write};
    let mut s = String::new();
    let _ = stdout().flush();
    stdin()
        .read_line(&mut s)
        .map_err(|e| GitlabMigrateError::new_with_source("Did not enter a correct string", e))?;
    Ok(trim_newline(s))
}

/// Remove the trailing line ending
fn trim_newline(mut s: String) -> String {
    if let Some('\n') = s.chars().next_back() {
        s.pop();
    }
    if let Some('\r') = s.chars().next_back() {
        s.pop();
    }
    s
}

/// Parse a yes/no answer
fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

/// Get a yes/no input from the user
pub(crate) fn yes_no_input<S: AsRef<str>>(msg: S) -> Result<bool, GitlabMigrateError> {
    let msg = msg.as_ref();
    loop {
        println!("{msg}");
        match parse_yes_no(&input()?) {
            Some(answer) => return Ok(answer),
            None => println!("Invalid input"),
        }
    }
}

/// Get password from the user
pub(crate) fn get_password() -> Result<String, GitlabMigrateError> {
    rpassword::read_password()
        .map_err(|e| GitlabMigrateError::new_with_source("Error reading password", e))
}
