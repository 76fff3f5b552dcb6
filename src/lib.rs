//! # gitlab-migrate
//!
//! Export, import, clean up and promote branches of GitLab projects during a migration
//!
//! ## Usage
//!
//! ```txt
//! Usage: gitlab-migrate [OPTIONS] [COMMAND]
//!
//! Commands:
//!   export   Export every project of a source group to local archives
//!   import   Import archives into a destination group
//!   cleanup  Delete projects that landed in a wrong namespace
//!   promote  Make one branch the only and default branch of projects
//!
//! Options:
//!   -c, --config <CONFIG>  Custom configuration file path
//!       --show-config-path Show the current config path
//!   -y, --yes              Don't ask for confirmation before deleting
//!   -v, --verbose...       Verbose mode (-v, -vv)
//!   -h, --help             Print help
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![deny(
    missing_docs,
    clippy::all,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::missing_docs_in_private_items))]
#![warn(clippy::multiple_crate_versions)]

pub mod cleanup;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod errors;
pub mod export;
pub mod gitlab;
pub mod import;
pub(crate) mod macros;
pub mod platform;
pub mod poll;
pub mod promote;
pub mod report;
pub(crate) mod utils;
pub(crate) use macros::config_password_wrap;
pub(crate) use macros::config_value;
pub(crate) use macros::config_value_wrap;

#[cfg(test)]
mod testing;

pub use cli::{gitlab_migrate_main, Command, GitlabMigrateCli};
pub use config::{ConfigData, GitlabMigrateConfig};
pub use errors::{GitlabMigrateError, GitlabMigrateErrorKind};
pub use utils::Direction;
