//! Canonical types shared by every driver.
//!
//! Drivers decode provider payloads into these values and never hand out the
//! provider's own wire types. All entities are snapshots: each read produces a
//! fresh value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pagination::PaginationResult;

// =============================================================================
// Users
// =============================================================================

/// Represents a user from a git hosting service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

// =============================================================================
// Pull requests
// =============================================================================

/// Pull request lifecycle state.
///
/// `Merged` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
    Merged,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "open",
            PullRequestState::Closed => "closed",
            PullRequestState::Merged => "merged",
        }
    }

    /// Whether the abstract state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: PullRequestState) -> bool {
        matches!(
            (self, next),
            (PullRequestState::Open, PullRequestState::Closed)
                | (PullRequestState::Open, PullRequestState::Merged)
                | (PullRequestState::Closed, PullRequestState::Open)
        )
    }
}

impl std::fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side (head or base) of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
    /// Full name of the repository the branch lives in (`owner/name`)
    #[serde(default)]
    pub repo: String,
}

/// Represents a pull request / merge request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Head commit
    #[serde(default)]
    pub sha: String,
    /// Server-side ref tracking the head, e.g. `refs/pull/1/head`
    #[serde(rename = "ref", default)]
    pub ref_name: String,
    /// Source branch name
    pub source: String,
    /// Target branch name
    pub target: String,
    pub head: PullRequestBranch,
    pub base: PullRequestBranch,
    /// Repository the head branch comes from
    #[serde(default)]
    pub fork: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub diff_link: String,
    pub state: PullRequestState,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub mergeable: bool,
    #[serde(default)]
    pub merge_sha: String,
    #[serde(default)]
    pub draft: bool,
    pub author: User,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Source branch
    pub head: String,
    /// Target branch
    pub base: String,
}

impl PullRequestInput {
    /// Reject empty or contradictory fields before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("pull request title is required".into()));
        }
        if self.head.trim().is_empty() {
            return Err(Error::Validation("pull request head branch is required".into()));
        }
        if self.base.trim().is_empty() {
            return Err(Error::Validation("pull request base branch is required".into()));
        }
        if self.head == self.base {
            return Err(Error::Validation(format!(
                "head and base are the same branch: {}",
                self.head
            )));
        }
        Ok(())
    }
}

/// How a pull request should be merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

/// Options for merging a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    #[serde(default)]
    pub method: MergeMethod,
    #[serde(default)]
    pub commit_title: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    /// Expected head commit; the provider refuses the merge if it moved
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub delete_source_branch: bool,
}

// =============================================================================
// Changes
// =============================================================================

/// One file's record within a pull request diff.
///
/// Only produced by [`crate::diff::parse_patch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    #[serde(default)]
    pub previous_path: String,
    #[serde(default)]
    pub added: bool,
    #[serde(default)]
    pub renamed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub binary: bool,
    pub additions: u64,
    pub deletions: u64,
    /// Hunk text of this file section
    #[serde(default)]
    pub patch: String,
}

// =============================================================================
// Contents
// =============================================================================

/// A repository file read at a given revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub path: String,
    /// Raw bytes as served by the provider
    pub data: Vec<u8>,
    /// Revision or ref the file was read at (empty for the default branch)
    #[serde(rename = "ref", default)]
    pub reference: String,
}

/// Commit author or committer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// Request descriptor for creating, updating or deleting a file.
///
/// `data` is sent exactly as given; callers apply whatever encoding the
/// provider expects (Gitea and GitLab take base64).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentParams {
    /// Target branch
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    pub message: String,
    #[serde(default)]
    pub data: Vec<u8>,
    /// Blob or commit the change is based on; required by some providers for update/delete
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub signature: Signature,
}

impl ContentParams {
    /// Payload as text, for providers that embed it in a JSON body.
    pub fn data_as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.data).map_err(|_| {
            Error::Validation(
                "content payload must be text (base64-encode binary files first)".into(),
            )
        })
    }

    pub fn validate_message(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::Validation("commit message is required".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Requested page; providers ignore fields they do not support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// 1-based page number (0 means provider default)
    #[serde(default)]
    pub page: u32,
    /// Page size (0 means provider default)
    #[serde(default)]
    pub size: u32,
}

/// Filter and page for listing pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestListOptions {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub closed: bool,
}

impl PullRequestListOptions {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            page: self.page,
            size: self.size,
        }
    }
}

/// One page of entities plus its paging descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

/// Response metadata returned by operations without an entity result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub pagination: PaginationResult,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
