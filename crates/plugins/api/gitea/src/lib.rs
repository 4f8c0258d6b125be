//! Gitea driver for forgekit.
//!
//! Implements pull request and repository content operations against the
//! Gitea REST API v1. Endpoints that changed across Gitea releases are picked
//! from the server version, probed once per client.

mod client;
mod types;

pub use client::GiteaClient;

/// Public Gitea demo instance.
pub const DEFAULT_GITEA_URL: &str = "https://demo.gitea.com";
