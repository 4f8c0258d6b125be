//! Gitea API response and request types.
//!
//! These types represent the raw JSON payloads of the Gitea REST API v1.
//! They are deserialized and then mapped to canonical types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// Gitea user representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GiteaUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
}

// =============================================================================
// Pull Request
// =============================================================================

/// Gitea repository, as embedded in a pull request branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
}

/// Head or base of a Gitea pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaPullRequestBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub repo: Option<GiteaRepository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaLabel {
    pub id: u64,
    pub name: String,
}

/// Gitea pull request representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaPullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    #[serde(default)]
    pub user: Option<GiteaUser>,
    #[serde(default)]
    pub labels: Vec<GiteaLabel>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub diff_url: String,
    #[serde(default)]
    pub mergeable: bool,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub draft: bool,
    pub head: GiteaPullRequestBranch,
    pub base: GiteaPullRequestBranch,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Request types
// =============================================================================

/// Request body for creating a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequestRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Request body for editing a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct EditPullRequestRequest {
    pub state: String,
}

/// Request body for merging a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct MergePullRequestRequest {
    /// "merge", "squash" or "rebase"
    #[serde(rename = "Do")]
    pub merge_style: String,
    #[serde(rename = "MergeTitleField", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "MergeMessageField", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_commit_id: Option<String>,
    /// Gitea 1.17+
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_branch_after_merge: Option<bool>,
}

/// Commit author or committer.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Request body for creating, updating or deleting a file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOptions {
    /// Base64 encoded file content; absent on delete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Blob SHA of the file being replaced or removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
}
