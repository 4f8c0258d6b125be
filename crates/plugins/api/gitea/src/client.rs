//! Gitea API client implementation.

use async_trait::async_trait;
use forgekit_core::config::{GiteaConfig, HttpConfig};
use forgekit_core::{
    diff, encode_path, error, pagination, Auth, Change, Content, ContentParams, ContentService,
    Context, Error, ListOptions, MergeMethod, MergeOptions, Operation, Paginated, Provider,
    ProviderKind, PullRequest, PullRequestBranch, PullRequestInput, PullRequestListOptions,
    PullRequestService, PullRequestState, RawRequest, RawResponse, Response, Result, Transport,
    User,
};
use tracing::{debug, warn};

use crate::types::{
    CreatePullRequestRequest, EditPullRequestRequest, FileOptions, GiteaPullRequest,
    GiteaPullRequestBranch, GiteaUser, Identity, MergePullRequestRequest,
};
use crate::DEFAULT_GITEA_URL;

const KIND: ProviderKind = ProviderKind::Gitea;

/// Probe endpoint answering `{"version": "1.21.0"}`.
const VERSION_PATH: &str = "api/v1/version";

/// Gitea API client.
#[derive(Debug)]
pub struct GiteaClient {
    transport: Transport,
}

impl GiteaClient {
    /// Create an anonymous client for the public demo instance.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_GITEA_URL, None::<String>)
    }

    /// Create a client for a custom Gitea instance.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<impl Into<String>>,
    ) -> Result<Self> {
        let auth = token.map(|t| token_auth(t.into())).unwrap_or_default();
        Ok(Self::with_transport(Transport::new(base_url, auth)?))
    }

    /// Create a client from the `[gitea]` and `[http]` config sections.
    pub fn from_config(config: &GiteaConfig, http: &HttpConfig) -> Result<Self> {
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

    /// Get the repository API path for a given endpoint.
    fn repo_path(&self, repo: &str, endpoint: &str) -> Result<String> {
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(format!(
                "api/v1/repos/{}{}",
                encode_path(repo),
                endpoint
            )),
            _ => Err(Error::Validation(format!(
                "Invalid repository '{}': expected owner/name",
                repo
            ))),
        }
    }

    /// Send a request and translate non-2xx responses.
    async fn send(&self, ctx: &Context, request: RawRequest) -> Result<RawResponse> {
        debug!(method = %request.method(), path = request.path(), "Gitea request");
        error::check(self.transport.execute(ctx, request).await?)
    }

    /// Whether `raw/{path}?ref=` is available (Gitea 1.14+).
    ///
    /// An unknown version falls back to the legacy form, which newer servers
    /// still serve.
    async fn raw_ref_query_supported(&self, ctx: &Context) -> Result<bool> {
        match self.transport.server_version(ctx).await {
            Ok(version) => Ok(version.at_least(1, 14)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                warn!(error = %err, "Gitea version unknown, using legacy raw endpoint");
                Ok(false)
            }
        }
    }

    async fn write_file(
        &self,
        ctx: &Context,
        request: RawRequest,
        body: &FileOptions,
    ) -> Result<Response> {
        let response = self.send(ctx, request.json(body)?).await?;
        Ok(response.into_response(Default::default()))
    }
}

fn token_auth(token: String) -> Auth {
    Auth::Token {
        header: "Authorization".to_string(),
        value: format!("token {}", token),
    }
}

// =============================================================================
// Mapping functions: Gitea types -> canonical types
// =============================================================================

fn map_user(user: &GiteaUser) -> User {
    User {
        id: user.id,
        login: user.login.clone(),
        name: user.full_name.clone(),
        email: user.email.clone(),
        avatar: user.avatar_url.clone(),
    }
}

fn map_branch(branch: &GiteaPullRequestBranch) -> PullRequestBranch {
    PullRequestBranch {
        ref_name: branch.ref_name.clone(),
        sha: branch.sha.clone(),
        repo: branch
            .repo
            .as_ref()
            .map(|r| r.full_name.clone())
            .unwrap_or_default(),
    }
}

fn map_pull_request(pr: &GiteaPullRequest) -> PullRequest {
    // Gitea reports merged pull requests as "closed" + merged flag
    let state = if pr.merged {
        PullRequestState::Merged
    } else if pr.state == "closed" {
        PullRequestState::Closed
    } else {
        PullRequestState::Open
    };
    let head = map_branch(&pr.head);

    PullRequest {
        number: pr.number,
        title: pr.title.clone(),
        body: pr.body.clone(),
        sha: pr.head.sha.clone(),
        ref_name: format!("refs/pull/{}/head", pr.number),
        source: pr.head.ref_name.clone(),
        target: pr.base.ref_name.clone(),
        fork: head.repo.clone(),
        head,
        base: map_branch(&pr.base),
        link: pr.html_url.clone(),
        diff_link: pr.diff_url.clone(),
        state,
        closed: pr.state == "closed",
        merged: pr.merged,
        mergeable: pr.mergeable,
        merge_sha: pr.merge_commit_sha.clone().unwrap_or_default(),
        draft: pr.draft,
        author: pr.user.as_ref().map(map_user).unwrap_or_default(),
        labels: pr.labels.iter().map(|l| l.name.clone()).collect(),
        created: pr.created_at,
        updated: pr.updated_at,
    }
}

fn list_state(opts: &PullRequestListOptions) -> &'static str {
    match (opts.open, opts.closed) {
        (true, false) => "open",
        (false, true) => "closed",
        _ => "all",
    }
}

fn merge_style(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Merge => "merge",
        MergeMethod::Squash => "squash",
        MergeMethod::Rebase => "rebase",
    }
}

fn file_options(params: &ContentParams, with_content: bool) -> Result<FileOptions> {
    params.validate_message()?;
    let content = if with_content {
        Some(params.data_as_str()?.to_string())
    } else {
        None
    };
    let identity = if params.signature.name.is_empty() && params.signature.email.is_empty() {
        None
    } else {
        Some(Identity {
            name: params.signature.name.clone(),
            email: params.signature.email.clone(),
        })
    };

    Ok(FileOptions {
        content,
        message: params.message.clone(),
        branch: params.reference.clone().filter(|b| !b.is_empty()),
        sha: params.sha.clone().filter(|s| !s.is_empty()),
        author: identity.clone(),
        committer: identity,
    })
}

fn require_sha(params: &ContentParams, action: &str) -> Result<()> {
    match params.sha.as_deref() {
        Some(sha) if !sha.is_empty() => Ok(()),
        _ => Err(Error::Validation(format!(
            "{} a file on Gitea requires the blob sha of the current version",
            action
        ))),
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl PullRequestService for GiteaClient {
    async fn find(&self, ctx: &Context, repo: &str, number: u64) -> Result<PullRequest> {
        KIND.capabilities().check(Operation::PullRequestFind)?;
        let path = self.repo_path(repo, &format!("/pulls/{}", number))?;
        let pr: GiteaPullRequest = self.send(ctx, RawRequest::get(path)).await?.json()?;
        Ok(map_pull_request(&pr))
    }

    async fn list(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &PullRequestListOptions,
    ) -> Result<Paginated<PullRequest>> {
        KIND.capabilities().check(Operation::PullRequestList)?;
        let path = self.repo_path(repo, "/pulls")?;

        let mut request = RawRequest::get(path).query("state", list_state(opts));
        if opts.page > 0 {
            request = request.query("page", opts.page);
        }
        if opts.size > 0 {
            request = request.query("limit", opts.size);
        }

        let response = self.send(ctx, request).await?;
        let prs: Vec<GiteaPullRequest> = response.json()?;
        Ok(Paginated {
            items: prs.iter().map(map_pull_request).collect(),
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
        let path = self.repo_path(repo, "/pulls")?;

        let body = CreatePullRequestRequest {
            title: input.title.clone(),
            body: input.body.clone(),
            head: input.head.clone(),
            base: input.base.clone(),
        };
        let pr: GiteaPullRequest = self
            .send(ctx, RawRequest::post(path).json(&body)?)
            .await?
            .json()?;
        Ok(map_pull_request(&pr))
    }

    async fn close(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestClose)?;
        let path = self.repo_path(repo, &format!("/pulls/{}", number))?;
        let body = EditPullRequestRequest {
            state: "closed".to_string(),
        };
        let response = self.send(ctx, RawRequest::patch(path).json(&body)?).await?;
        Ok(response.into_response(Default::default()))
    }

    async fn reopen(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestReopen)?;
        let path = self.repo_path(repo, &format!("/pulls/{}", number))?;
        let body = EditPullRequestRequest {
            state: "open".to_string(),
        };
        let response = self.send(ctx, RawRequest::patch(path).json(&body)?).await?;
        Ok(response.into_response(Default::default()))
    }

    async fn merge(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        opts: &MergeOptions,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestMerge)?;
        let path = self.repo_path(repo, &format!("/pulls/{}/merge", number))?;

        let delete_branch_after_merge = if opts.delete_source_branch {
            let version = self.transport.server_version(ctx).await?;
            if !version.at_least(1, 17) {
                return Err(Error::Validation(format!(
                    "Deleting the source branch on merge needs Gitea 1.17 or newer, server is {}",
                    version
                )));
            }
            Some(true)
        } else {
            None
        };

        let body = MergePullRequestRequest {
            merge_style: merge_style(opts.method).to_string(),
            title: opts.commit_title.clone(),
            message: opts.commit_message.clone(),
            head_commit_id: opts.sha.clone(),
            delete_branch_after_merge,
        };

        // Gitea answers 200 or 204, both without a body
        let response = self.send(ctx, RawRequest::post(path).json(&body)?).await?;
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
        // The patch is served whole; paging options do not apply
        let path = self.repo_path(repo, &format!("/pulls/{}.patch", number))?;
        let response = self.send(ctx, RawRequest::get(path)).await?;
        Ok(diff::parse_patch(&response.text()))
    }
}

#[async_trait]
impl ContentService for GiteaClient {
    async fn find(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Content> {
        KIND.capabilities().check(Operation::ContentFind)?;
        let file = encode_path(path);

        let request = if self.raw_ref_query_supported(ctx).await? {
            let request = RawRequest::get(self.repo_path(repo, &format!("/raw/{}", file))?);
            if reference.is_empty() {
                request
            } else {
                request.query("ref", reference)
            }
        } else if reference.is_empty() {
            RawRequest::get(self.repo_path(repo, &format!("/raw/{}", file))?)
        } else {
            RawRequest::get(self.repo_path(
                repo,
                &format!("/raw/{}/{}", encode_path(reference), file),
            )?)
        };

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
        let body = file_options(params, true)?;
        let endpoint = self.repo_path(repo, &format!("/contents/{}", encode_path(path)))?;
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
        require_sha(params, "Updating")?;
        let body = file_options(params, true)?;
        let endpoint = self.repo_path(repo, &format!("/contents/{}", encode_path(path)))?;
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
        require_sha(params, "Deleting")?;
        let body = file_options(params, false)?;
        let endpoint = self.repo_path(repo, &format!("/contents/{}", encode_path(path)))?;
        self.write_file(ctx, RawRequest::delete(endpoint), &body).await
    }
}

impl Provider for GiteaClient {
    fn kind(&self) -> ProviderKind {
        KIND
    }
}
