//! GitLab API client implementation.

use async_trait::async_trait;
use forgekit_core::config::{GitLabConfig, HttpConfig};
use forgekit_core::{
    diff, error, pagination, Auth, Change, Content, ContentParams, ContentService, Context, Error,
    ListOptions, MergeMethod, MergeOptions, Operation, Paginated, Provider, ProviderKind,
    PullRequest, PullRequestBranch, PullRequestInput, PullRequestListOptions, PullRequestService,
    PullRequestState, RawRequest, RawResponse, Response, Result, Transport, User,
};
use tracing::{debug, warn};

use crate::types::{
    AcceptMergeRequestRequest, CreateMergeRequestRequest, FileRequest, GitLabDiff,
    GitLabMergeRequest, GitLabMergeRequestChanges, GitLabUser, UpdateMergeRequestRequest,
};
use crate::DEFAULT_GITLAB_URL;

const KIND: ProviderKind = ProviderKind::GitLab;

/// Probe endpoint answering `{"version": "17.9.1-ee", "revision": "..."}`.
const VERSION_PATH: &str = "api/v4/version";

/// GitLab API client.
#[derive(Debug)]
pub struct GitLabClient {
    transport: Transport,
}

impl GitLabClient {
    /// Create a new client for gitlab.com.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_GITLAB_URL, Some(token))
    }

    /// Create a new GitLab client with a custom base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<impl Into<String>>,
    ) -> Result<Self> {
        let auth = token.map(|t| token_auth(t.into())).unwrap_or_default();
        Ok(Self::with_transport(Transport::new(base_url, auth)?))
    }

    /// Create a client from the `[gitlab]` and `[http]` config sections.
    pub fn from_config(config: &GitLabConfig, http: &HttpConfig) -> Result<Self> {
        let auth = config.token.clone().map(token_auth).unwrap_or_default();
        Ok(Self::with_transport(Transport::from_config(
            &config.url,
            auth,
            http,
        )?))
    }

    /// Wrap an existing transport. The version probe is attached here.
    pub fn with_transport(transport: Transport) -> Self {
        Self {
            transport: transport.with_probe(VERSION_PATH),
        }
    }

    /// Get the project API path for a given endpoint.
    ///
    /// `repo` is either a numeric project id or a `group/project` path, which
    /// GitLab expects URL-encoded as a single segment.
    fn project_path(&self, repo: &str, endpoint: &str) -> Result<String> {
        if repo.is_empty() || repo.starts_with('/') || repo.ends_with('/') {
            return Err(Error::Validation(format!(
                "Invalid project '{}': expected a project id or group/project",
                repo
            )));
        }
        Ok(format!(
            "api/v4/projects/{}{}",
            urlencoding::encode(repo),
            endpoint
        ))
    }

    fn file_path(&self, repo: &str, path: &str, suffix: &str) -> Result<String> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(Error::Validation("file path is required".to_string()));
        }
        self.project_path(
            repo,
            &format!("/repository/files/{}{}", urlencoding::encode(path), suffix),
        )
    }

    /// Send a request and translate non-2xx responses.
    async fn send(&self, ctx: &Context, request: RawRequest) -> Result<RawResponse> {
        debug!(method = %request.method(), path = request.path(), "GitLab request");
        error::check(self.transport.execute(ctx, request).await?)
    }

    /// Whether `merge_requests/{n}/raw_diffs` is available (GitLab 17.9+).
    ///
    /// An unknown version falls back to the `changes` endpoint, which every
    /// server still serves.
    async fn raw_diffs_supported(&self, ctx: &Context) -> Result<bool> {
        match self.transport.server_version(ctx).await {
            Ok(version) => Ok(version.at_least(17, 9)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                warn!(error = %err, "GitLab version unknown, using changes endpoint");
                Ok(false)
            }
        }
    }

    async fn update_state(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        state_event: &str,
    ) -> Result<Response> {
        let path = self.project_path(repo, &format!("/merge_requests/{}", number))?;
        let body = UpdateMergeRequestRequest {
            state_event: state_event.to_string(),
        };
        let response = self.send(ctx, RawRequest::put(path).json(&body)?).await?;
        Ok(response.into_response(Default::default()))
    }

    async fn write_file(
        &self,
        ctx: &Context,
        request: RawRequest,
        body: &FileRequest,
    ) -> Result<Response> {
        let response = self.send(ctx, request.json(body)?).await?;
        Ok(response.into_response(Default::default()))
    }
}

fn token_auth(token: String) -> Auth {
    Auth::Token {
        header: "PRIVATE-TOKEN".to_string(),
        value: token,
    }
}

// =============================================================================
// Mapping functions: GitLab types -> canonical types
// =============================================================================

fn map_user(gl_user: Option<&GitLabUser>) -> User {
    gl_user
        .map(|u| User {
            id: u.id,
            login: u.username.clone(),
            name: u.name.clone().unwrap_or_default(),
            // GitLab doesn't return email in most contexts
            email: u.public_email.clone().unwrap_or_default(),
            avatar: u.avatar_url.clone().unwrap_or_default(),
        })
        .unwrap_or_default()
}

fn map_state(state: &str) -> PullRequestState {
    match state {
        "merged" => PullRequestState::Merged,
        "closed" => PullRequestState::Closed,
        // "opened" and "locked" (a transient state while merging)
        _ => PullRequestState::Open,
    }
}

/// `repo` is the project the request was made against. The source project of
/// a fork is only known by id, so the branch repo is left empty for forks.
fn map_merge_request(gl_mr: &GitLabMergeRequest, repo: &str) -> PullRequest {
    let state = map_state(&gl_mr.state);
    let head_sha = gl_mr
        .sha
        .clone()
        .or_else(|| gl_mr.diff_refs.as_ref().map(|d| d.head_sha.clone()))
        .unwrap_or_default();
    let head_repo = if gl_mr.source_project_id == gl_mr.target_project_id {
        repo.to_string()
    } else {
        String::new()
    };

    PullRequest {
        number: gl_mr.iid,
        title: gl_mr.title.clone(),
        body: gl_mr.description.clone().unwrap_or_default(),
        sha: head_sha.clone(),
        ref_name: format!("refs/merge-requests/{}/head", gl_mr.iid),
        source: gl_mr.source_branch.clone(),
        target: gl_mr.target_branch.clone(),
        head: PullRequestBranch {
            ref_name: gl_mr.source_branch.clone(),
            sha: head_sha,
            repo: head_repo.clone(),
        },
        base: PullRequestBranch {
            ref_name: gl_mr.target_branch.clone(),
            sha: gl_mr
                .diff_refs
                .as_ref()
                .map(|d| d.base_sha.clone())
                .unwrap_or_default(),
            repo: repo.to_string(),
        },
        fork: head_repo,
        link: gl_mr.web_url.clone(),
        diff_link: format!("{}.diff", gl_mr.web_url),
        state,
        closed: state != PullRequestState::Open,
        merged: state == PullRequestState::Merged,
        mergeable: gl_mr.merge_status.as_deref() == Some("can_be_merged"),
        merge_sha: gl_mr
            .merge_commit_sha
            .clone()
            .or_else(|| gl_mr.squash_commit_sha.clone())
            .unwrap_or_default(),
        draft: gl_mr.draft || gl_mr.work_in_progress,
        author: map_user(gl_mr.author.as_ref()),
        labels: gl_mr.labels.clone(),
        created: gl_mr.created_at,
        updated: gl_mr.updated_at,
    }
}

/// Rebuild a `diff --git` section from the header flags and hunks of the
/// `changes` endpoint, so both change endpoints go through the same parser.
fn render_diff(gl_diff: &GitLabDiff, out: &mut String) {
    out.push_str(&format!(
        "diff --git a/{} b/{}\n",
        gl_diff.old_path, gl_diff.new_path
    ));
    if gl_diff.new_file {
        out.push_str(&format!(
            "new file mode {}\n",
            gl_diff.b_mode.as_deref().unwrap_or("100644")
        ));
    }
    if gl_diff.deleted_file {
        out.push_str(&format!(
            "deleted file mode {}\n",
            gl_diff.a_mode.as_deref().unwrap_or("100644")
        ));
    }
    if gl_diff.renamed_file {
        out.push_str(&format!("rename from {}\n", gl_diff.old_path));
        out.push_str(&format!("rename to {}\n", gl_diff.new_path));
    }

    if gl_diff.diff.is_empty() {
        return;
    }
    if !gl_diff.diff.starts_with("Binary files ") {
        let old = if gl_diff.new_file {
            "/dev/null".to_string()
        } else {
            format!("a/{}", gl_diff.old_path)
        };
        let new = if gl_diff.deleted_file {
            "/dev/null".to_string()
        } else {
            format!("b/{}", gl_diff.new_path)
        };
        out.push_str(&format!("--- {}\n+++ {}\n", old, new));
    }
    out.push_str(&gl_diff.diff);
    if !gl_diff.diff.ends_with('\n') {
        out.push('\n');
    }
}

fn render_patch(changes: &GitLabMergeRequestChanges) -> String {
    let mut out = String::new();
    for gl_diff in &changes.changes {
        render_diff(gl_diff, &mut out);
    }
    out
}

// =============================================================================
// Helper functions
// =============================================================================

fn list_state(opts: &PullRequestListOptions) -> &'static str {
    match (opts.open, opts.closed) {
        (true, false) => "opened",
        (false, true) => "closed",
        _ => "all",
    }
}

fn accept_request(opts: &MergeOptions) -> Result<AcceptMergeRequestRequest> {
    let mut request = AcceptMergeRequestRequest {
        sha: opts.sha.clone(),
        should_remove_source_branch: opts.delete_source_branch.then_some(true),
        ..Default::default()
    };
    match opts.method {
        MergeMethod::Merge => request.merge_commit_message = opts.commit_message.clone(),
        MergeMethod::Squash => {
            request.squash = Some(true);
            request.squash_commit_message = opts.commit_message.clone();
        }
        MergeMethod::Rebase => {
            return Err(Error::Validation(
                "GitLab merges with the project's merge method; rebase is not a merge option"
                    .to_string(),
            ))
        }
    }
    Ok(request)
}

fn file_request(params: &ContentParams, with_content: bool) -> Result<FileRequest> {
    params.validate_message()?;
    let branch = params
        .reference
        .clone()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::Validation("GitLab file commits require a branch".to_string()))?;
    let content = if with_content {
        Some(params.data_as_str()?.to_string())
    } else {
        None
    };
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    Ok(FileRequest {
        branch,
        commit_message: params.message.clone(),
        encoding: content.as_ref().map(|_| "base64".to_string()),
        content,
        author_name: non_empty(&params.signature.name),
        author_email: non_empty(&params.signature.email),
        last_commit_id: params.sha.clone().filter(|s| !s.is_empty()),
    })
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl PullRequestService for GitLabClient {
    async fn find(&self, ctx: &Context, repo: &str, number: u64) -> Result<PullRequest> {
        KIND.capabilities().check(Operation::PullRequestFind)?;
        let path = self.project_path(repo, &format!("/merge_requests/{}", number))?;
        let gl_mr: GitLabMergeRequest = self.send(ctx, RawRequest::get(path)).await?.json()?;
        Ok(map_merge_request(&gl_mr, repo))
    }

    async fn list(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &PullRequestListOptions,
    ) -> Result<Paginated<PullRequest>> {
        KIND.capabilities().check(Operation::PullRequestList)?;
        let path = self.project_path(repo, "/merge_requests")?;

        let mut request = RawRequest::get(path).query("state", list_state(opts));
        if opts.page > 0 {
            request = request.query("page", opts.page);
        }
        if opts.size > 0 {
            request = request.query("per_page", opts.size.min(100));
        }

        let response = self.send(ctx, request).await?;
        let gl_mrs: Vec<GitLabMergeRequest> = response.json()?;
        Ok(Paginated {
            items: gl_mrs.iter().map(|mr| map_merge_request(mr, repo)).collect(),
            pagination: pagination::normalize(&response.headers, None, opts.list_options()),
        })
    }

    async fn create(
        &self,
        ctx: &Context,
        repo: &str,
        input: &PullRequestInput,
    ) -> Result<PullRequest> {
        KIND.capabilities().check(Operation::PullRequestCreate)?;
        input.validate()?;
        let path = self.project_path(repo, "/merge_requests")?;

        let body = CreateMergeRequestRequest {
            source_branch: input.head.clone(),
            target_branch: input.base.clone(),
            title: input.title.clone(),
            description: (!input.body.is_empty()).then(|| input.body.clone()),
        };
        let gl_mr: GitLabMergeRequest = self
            .send(ctx, RawRequest::post(path).json(&body)?)
            .await?
            .json()?;
        Ok(map_merge_request(&gl_mr, repo))
    }

    async fn close(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestClose)?;
        self.update_state(ctx, repo, number, "close").await
    }

    async fn reopen(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestReopen)?;
        self.update_state(ctx, repo, number, "reopen").await
    }

    async fn merge(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        opts: &MergeOptions,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestMerge)?;
        let body = accept_request(opts)?;
        let path = self.project_path(repo, &format!("/merge_requests/{}/merge", number))?;
        let response = self.send(ctx, RawRequest::put(path).json(&body)?).await?;
        Ok(response.into_response(Default::default()))
    }

    async fn list_changes(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        _opts: &ListOptions,
    ) -> Result<Vec<Change>> {
        KIND.capabilities().check(Operation::PullRequestListChanges)?;

        if self.raw_diffs_supported(ctx).await? {
            let path = self.project_path(repo, &format!("/merge_requests/{}/raw_diffs", number))?;
            let response = self.send(ctx, RawRequest::get(path)).await?;
            return Ok(diff::parse_patch(&response.text()));
        }

        let path = self.project_path(repo, &format!("/merge_requests/{}/changes", number))?;
        let changes: GitLabMergeRequestChanges =
            self.send(ctx, RawRequest::get(path)).await?.json()?;
        Ok(diff::parse_patch(&render_patch(&changes)))
    }
}

#[async_trait]
impl ContentService for GitLabClient {
    async fn find(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Content> {
        KIND.capabilities().check(Operation::ContentFind)?;
        let mut request = RawRequest::get(self.file_path(repo, path, "/raw")?);
        if !reference.is_empty() {
            request = request.query("ref", reference);
        }

        let response = self.send(ctx, request).await?;
        Ok(Content {
            path: path.to_string(),
            data: response.body,
            reference: reference.to_string(),
        })
    }

    async fn create(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::ContentCreate)?;
        let body = file_request(params, true)?;
        let endpoint = self.file_path(repo, path, "")?;
        self.write_file(ctx, RawRequest::post(endpoint), &body).await
    }

    async fn update(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::ContentUpdate)?;
        let body = file_request(params, true)?;
        let endpoint = self.file_path(repo, path, "")?;
        self.write_file(ctx, RawRequest::put(endpoint), &body).await
    }

    async fn delete(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        params: &ContentParams,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::ContentDelete)?;
        let body = file_request(params, false)?;
        let endpoint = self.file_path(repo, path, "")?;
        self.write_file(ctx, RawRequest::delete(endpoint), &body).await
    }
}

impl Provider for GitLabClient {
    fn kind(&self) -> ProviderKind {
        KIND
    }
}
