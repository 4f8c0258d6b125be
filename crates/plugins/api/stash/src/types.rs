//! Bitbucket Server API response and request types.
//!
//! Field names follow the REST API 1.0 camelCase payloads. Timestamps are
//! Unix milliseconds.

use serde::{Deserialize, Serialize};

// =============================================================================
// Paging
// =============================================================================

/// Paged list envelope used by every Bitbucket Server collection endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashPage<T> {
    pub values: Vec<T>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub is_last_page: bool,
    #[serde(default)]
    pub next_page_start: Option<u32>,
    #[serde(default)]
    pub start: u32,
}

// =============================================================================
// Users and repositories
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashUser {
    #[serde(default)]
    pub id: u64,
    /// Username
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashParticipant {
    pub user: StashUser,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashProject {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashRepository {
    pub slug: String,
    pub project: StashProject,
}

// =============================================================================
// Pull Request
// =============================================================================

/// Source or target of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashRef {
    /// Full ref, e.g. `refs/heads/feature`
    pub id: String,
    pub display_id: String,
    #[serde(default)]
    pub latest_commit: Option<String>,
    pub repository: StashRepository,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StashLink {
    pub href: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StashLinks {
    #[serde(rename = "self", default)]
    pub self_links: Vec<StashLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashMergeResult {
    #[serde(default)]
    pub outcome: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashProperties {
    #[serde(default)]
    pub merge_result: Option<StashMergeResult>,
    #[serde(default)]
    pub merge_commit: Option<StashCommitRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashCommitRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashPullRequest {
    pub id: u64,
    #[serde(default)]
    pub version: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// OPEN, DECLINED or MERGED
    pub state: String,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub created_date: Option<i64>,
    #[serde(default)]
    pub updated_date: Option<i64>,
    pub from_ref: StashRef,
    pub to_ref: StashRef,
    pub author: StashParticipant,
    #[serde(default)]
    pub properties: StashProperties,
    #[serde(default)]
    pub links: StashLinks,
}

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ProjectKey {
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRef {
    pub slug: String,
    pub project: ProjectKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefTarget {
    pub id: String,
    pub repository: RepositoryRef,
}

/// Request body for creating a pull request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestRequest {
    pub title: String,
    pub description: String,
    pub from_ref: RefTarget,
    pub to_ref: RefTarget,
}

/// Request body for merging a pull request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePullRequestRequest {
    pub strategy_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Request body for committing a file through `browse/{path}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCreateRequest {
    pub content: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}
