//! GitLab driver for forgekit.
//!
//! Merge requests are exposed as pull requests and repository files as
//! contents, using the GitLab REST API v4. The changes endpoint is picked
//! from the server version, probed once per client.

mod client;
mod types;

pub use client::GitLabClient;

/// Default GitLab API URL.
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
