//! GitLab REST API (v4) implementation of [`crate::platform::Platform`]
pub mod config;
pub mod platform;
pub mod repo;

/// Header carrying the access token
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Number of items requested per page
const PER_PAGE: &str = "100";
