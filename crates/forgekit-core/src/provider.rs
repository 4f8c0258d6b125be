//! Service traits implemented by every provider driver.
//!
//! `repo` is always the provider's repository path (`owner/name`,
//! `PROJECT/slug`, or a GitLab project path). Drivers gate each operation on
//! their capability table before any I/O.

use async_trait::async_trait;

use crate::capability::{Capabilities, ProviderKind};
use crate::error::Result;
use crate::transport::Context;
use crate::types::{
    Change, Content, ContentParams, ListOptions, MergeOptions, Paginated, PullRequest,
    PullRequestInput, PullRequestListOptions, Response,
};

/// Pull request operations.
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Get a single pull request by number.
    async fn find(&self, ctx: &Context, repo: &str, number: u64) -> Result<PullRequest>;

    /// List pull requests, one page at a time.
    async fn list(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &PullRequestListOptions,
    ) -> Result<Paginated<PullRequest>>;

    async fn create(&self, ctx: &Context, repo: &str, input: &PullRequestInput)
        -> Result<PullRequest>;

    async fn close(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response>;

    async fn reopen(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response>;

    /// Merge a pull request. A 2xx with an empty body is success.
    async fn merge(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        opts: &MergeOptions,
    ) -> Result<Response>;

    /// Files changed by a pull request, in diff order.
    async fn list_changes(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        opts: &ListOptions,
    ) -> Result<Vec<Change>>;
}

/// Repository file operations.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Read a file at `reference` (empty for the default branch).
    async fn find(&self, ctx: &Context, repo: &str, path: &str, reference: &str)
        -> Result<Content>;

    async fn create(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response>;

    async fn update(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response>;

    async fn delete(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response>;
}

/// A complete driver: both services for one provider.
pub trait Provider: PullRequestService + ContentService {
    fn kind(&self) -> ProviderKind;

    fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }
}
