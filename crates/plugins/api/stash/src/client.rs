//! Bitbucket Server API client implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgekit_core::config::{HttpConfig, StashConfig};
use forgekit_core::{
    diff, encode_path, error, pagination, Auth, Change, Content, ContentParams, ContentService,
    Context, Error, ListOptions, MergeMethod, MergeOptions, Operation, Paginated, Provider,
    ProviderKind, PullRequest, PullRequestBranch, PullRequestInput, PullRequestListOptions,
    PullRequestService, PullRequestState, RawRequest, RawResponse, Response, Result, Transport,
    User,
};
use tracing::debug;

use crate::types::{
    Author, ContentCreateRequest, CreatePullRequestRequest, MergePullRequestRequest, ProjectKey,
    RefTarget, RepositoryRef, StashPage, StashPullRequest, StashRef, StashUser,
};

const KIND: ProviderKind = ProviderKind::Stash;

/// Page size Bitbucket Server applies when no `limit` is sent.
const DEFAULT_PAGE_LIMIT: u32 = 25;

/// Bitbucket Server API client.
#[derive(Debug)]
pub struct StashClient {
    transport: Transport,
}

/// `PROJECT/slug` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RepoName<'a> {
    project: &'a str,
    slug: &'a str,
}

impl<'a> RepoName<'a> {
    fn parse(repo: &'a str) -> Result<Self> {
        match repo.split_once('/') {
            Some((project, slug))
                if !project.is_empty() && !slug.is_empty() && !slug.contains('/') =>
            {
                Ok(Self { project, slug })
            }
            _ => Err(Error::Validation(format!(
                "Invalid repository '{}': expected PROJECT/slug",
                repo
            ))),
        }
    }

    fn repository(&self) -> RepositoryRef {
        RepositoryRef {
            slug: self.slug.to_string(),
            project: ProjectKey {
                key: self.project.to_string(),
            },
        }
    }
}

impl StashClient {
    /// Create a client for a Bitbucket Server instance.
    pub fn with_base_url(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        Ok(Self::with_transport(Transport::new(base_url, auth)?))
    }

    /// Create a client from the `[stash]` and `[http]` config sections.
    ///
    /// A configured username switches from bearer tokens to basic auth.
    pub fn from_config(config: &StashConfig, http: &HttpConfig) -> Result<Self> {
        let auth = match (&config.username, &config.token) {
            (Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            (Some(_), None) => {
                return Err(Error::Config(
                    "stash.username is set but stash.token (password) is missing".to_string(),
                ))
            }
            (None, Some(token)) => Auth::Bearer(token.clone()),
            (None, None) => Auth::None,
        };
        Ok(Self::with_transport(Transport::from_config(
            &config.url,
            auth,
            http,
        )?))
    }

    /// Wrap an existing transport. Bitbucket Server needs no version probe.
    pub fn with_transport(transport: Transport) -> Self {
        Self { transport }
    }

    /// Get the repository API path for a given endpoint.
    fn repo_path(&self, repo: &RepoName<'_>, endpoint: &str) -> String {
        format!(
            "rest/api/1.0/projects/{}/repos/{}{}",
            encode_path(repo.project),
            encode_path(repo.slug),
            endpoint
        )
    }

    /// Send a request and translate non-2xx responses.
    async fn send(&self, ctx: &Context, request: RawRequest) -> Result<RawResponse> {
        debug!(method = %request.method(), path = request.path(), "Bitbucket Server request");
        error::check(self.transport.execute(ctx, request).await?)
    }

    /// POST a state transition (`decline`, `reopen`) without a body.
    async fn transition(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        action: &str,
    ) -> Result<Response> {
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, &format!("/pull-requests/{}/{}", number, action));
        let request = RawRequest::post(path).json(&serde_json::json!({}))?;
        let response = self.send(ctx, request).await?;
        Ok(response.into_response(Default::default()))
    }
}

// =============================================================================
// Mapping functions: Bitbucket Server types -> canonical types
// =============================================================================

fn map_user(user: &StashUser) -> User {
    User {
        id: user.id,
        login: user.name.clone(),
        name: user.display_name.clone(),
        email: user.email_address.clone(),
        // Avatars need a separate request
        avatar: String::new(),
    }
}

fn map_ref(r: &StashRef) -> PullRequestBranch {
    PullRequestBranch {
        ref_name: r.display_id.clone(),
        sha: r.latest_commit.clone().unwrap_or_default(),
        repo: format!("{}/{}", r.repository.project.key, r.repository.slug),
    }
}

fn map_timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

fn map_state(state: &str) -> PullRequestState {
    match state {
        "MERGED" => PullRequestState::Merged,
        "DECLINED" => PullRequestState::Closed,
        _ => PullRequestState::Open,
    }
}

fn map_pull_request(pr: &StashPullRequest) -> PullRequest {
    let link = pr
        .links
        .self_links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let diff_link = if link.is_empty() {
        String::new()
    } else {
        format!("{}/diff", link)
    };
    let head = map_ref(&pr.from_ref);
    let state = map_state(&pr.state);

    PullRequest {
        number: pr.id,
        title: pr.title.clone(),
        body: pr.description.clone().unwrap_or_default(),
        sha: head.sha.clone(),
        ref_name: format!("refs/pull-requests/{}/from", pr.id),
        source: pr.from_ref.display_id.clone(),
        target: pr.to_ref.display_id.clone(),
        fork: head.repo.clone(),
        head,
        base: map_ref(&pr.to_ref),
        link,
        diff_link,
        state,
        closed: pr.closed,
        merged: state == PullRequestState::Merged,
        mergeable: pr
            .properties
            .merge_result
            .as_ref()
            .is_some_and(|m| m.outcome == "CLEAN"),
        merge_sha: pr
            .properties
            .merge_commit
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_default(),
        draft: pr.draft,
        author: map_user(&pr.author.user),
        labels: Vec::new(),
        created: map_timestamp(pr.created_date),
        updated: map_timestamp(pr.updated_date),
    }
}

fn list_state(opts: &PullRequestListOptions) -> &'static str {
    match (opts.open, opts.closed) {
        (true, false) => "OPEN",
        (false, true) => "DECLINED",
        _ => "ALL",
    }
}

fn merge_strategy(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Merge => "no-ff",
        MergeMethod::Squash => "squash",
        MergeMethod::Rebase => "rebase-no-ff",
    }
}

/// `start`/`limit` for a 1-based page, or `None` to take the server default.
fn page_window(opts: &PullRequestListOptions) -> Result<Option<(u32, u32)>> {
    let limit = match (opts.size, opts.page) {
        (0, 0..=1) => return Ok(None),
        (0, _) => DEFAULT_PAGE_LIMIT,
        (size, _) => size,
    };
    let start = opts
        .page
        .saturating_sub(1)
        .checked_mul(limit)
        .ok_or_else(|| {
            Error::Validation(format!(
                "page {} of size {} is out of range",
                opts.page, limit
            ))
        })?;
    Ok(Some((start, limit)))
}

fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

fn content_request(params: &ContentParams) -> Result<ContentCreateRequest> {
    params.validate_message()?;
    let author = if params.signature.name.is_empty() && params.signature.email.is_empty() {
        None
    } else {
        Some(Author {
            name: params.signature.name.clone(),
            email: params.signature.email.clone(),
        })
    };

    Ok(ContentCreateRequest {
        content: params.data_as_str()?.to_string(),
        message: params.message.clone(),
        branch: params.reference.clone().filter(|b| !b.is_empty()),
        source_commit_id: params.sha.clone().filter(|s| !s.is_empty()),
        author,
    })
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl PullRequestService for StashClient {
    async fn find(&self, ctx: &Context, repo: &str, number: u64) -> Result<PullRequest> {
        KIND.capabilities().check(Operation::PullRequestFind)?;
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, &format!("/pull-requests/{}", number));
        let pr: StashPullRequest = self.send(ctx, RawRequest::get(path)).await?.json()?;
        Ok(map_pull_request(&pr))
    }

    async fn list(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &PullRequestListOptions,
    ) -> Result<Paginated<PullRequest>> {
        KIND.capabilities().check(Operation::PullRequestList)?;
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, "/pull-requests");

        let mut request = RawRequest::get(path).query("state", list_state(opts));
        if let Some((start, limit)) = page_window(opts)? {
            if start > 0 {
                request = request.query("start", start);
            }
            request = request.query("limit", limit);
        }

        let response = self.send(ctx, request).await?;
        let envelope: serde_json::Value = response.json()?;
        let pagination =
            pagination::normalize(&response.headers, Some(&envelope), opts.list_options());
        let page: StashPage<StashPullRequest> = serde_json::from_value(envelope)?;

        Ok(Paginated {
            items: page.values.iter().map(map_pull_request).collect(),
            pagination,
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
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, "/pull-requests");

        let body = CreatePullRequestRequest {
            title: input.title.clone(),
            description: input.body.clone(),
            from_ref: RefTarget {
                id: branch_ref(&input.head),
                repository: repo.repository(),
            },
            to_ref: RefTarget {
                id: branch_ref(&input.base),
                repository: repo.repository(),
            },
        };
        let pr: StashPullRequest = self
            .send(ctx, RawRequest::post(path).json(&body)?)
            .await?
            .json()?;
        Ok(map_pull_request(&pr))
    }

    async fn close(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestClose)?;
        self.transition(ctx, repo, number, "decline").await
    }

    async fn reopen(&self, ctx: &Context, repo: &str, number: u64) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestReopen)?;
        self.transition(ctx, repo, number, "reopen").await
    }

    async fn merge(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        opts: &MergeOptions,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::PullRequestMerge)?;
        if opts.delete_source_branch {
            return Err(Error::Validation(
                "Bitbucket Server cannot delete the source branch as part of a merge".to_string(),
            ));
        }
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, &format!("/pull-requests/{}/merge", number));

        let body = MergePullRequestRequest {
            strategy_id: merge_strategy(opts.method).to_string(),
            message: opts.commit_message.clone(),
        };
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
        let repo = RepoName::parse(repo)?;
        let path = self.repo_path(&repo, &format!("/pull-requests/{}.diff", number));
        let response = self.send(ctx, RawRequest::get(path)).await?;
        Ok(diff::parse_patch(&response.text()))
    }
}

#[async_trait]
impl ContentService for StashClient {
    async fn find(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Content> {
        KIND.capabilities().check(Operation::ContentFind)?;
        let repo = RepoName::parse(repo)?;
        let endpoint = self.repo_path(&repo, &format!("/raw/{}", encode_path(path)));

        let mut request = RawRequest::get(endpoint);
        if !reference.is_empty() {
            request = request.query("at", reference);
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
        let body = content_request(params)?;
        let repo = RepoName::parse(repo)?;
        let endpoint = self.repo_path(&repo, &format!("/browse/{}", encode_path(path)));

        let response = self.send(ctx, RawRequest::put(endpoint).json(&body)?).await?;
        Ok(response.into_response(Default::default()))
    }

    async fn update(
        &self,
        _ctx: &Context,
        _repo: &str,
        _path: &str,
        _params: &ContentParams,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::ContentUpdate)?;
        Err(Error::Unsupported)
    }

    async fn delete(
        &self,
        _ctx: &Context,
        _repo: &str,
        _path: &str,
        _params: &ContentParams,
    ) -> Result<Response> {
        KIND.capabilities().check(Operation::ContentDelete)?;
        Err(Error::Unsupported)
    }
}

impl Provider for StashClient {
    fn kind(&self) -> ProviderKind {
        KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PR_JSON: &str = include_str!("../tests/fixtures/pr.json");
    const PR_GOLDEN: &str = include_str!("../tests/fixtures/pr.golden.json");

    fn golden_pull_request() -> PullRequest {
        serde_json::from_str(PR_GOLDEN).unwrap()
    }

    #[test]
    fn test_map_pull_request_matches_golden() {
        let pr: StashPullRequest = serde_json::from_str(PR_JSON).unwrap();
        assert_eq!(map_pull_request(&pr), golden_pull_request());
    }

    #[test]
    fn test_map_state() {
        assert_eq!(map_state("OPEN"), PullRequestState::Open);
        assert_eq!(map_state("DECLINED"), PullRequestState::Closed);
        assert_eq!(map_state("MERGED"), PullRequestState::Merged);
    }

    #[test]
    fn test_map_timestamp() {
        let created = map_timestamp(Some(1530560631000)).unwrap();
        assert_eq!(created.to_rfc3339(), "2018-07-02T19:43:51+00:00");
        assert!(map_timestamp(None).is_none());
    }

    #[test]
    fn test_repo_name() {
        let repo = RepoName::parse("PRJ/my-repo").unwrap();
        assert_eq!(repo.project, "PRJ");
        assert_eq!(repo.slug, "my-repo");
        assert!(RepoName::parse("my-repo").is_err());
        assert!(RepoName::parse("PRJ/a/b").is_err());
        assert!(RepoName::parse("/my-repo").is_err());
    }

    #[test]
    fn test_branch_ref() {
        assert_eq!(branch_ref("feature"), "refs/heads/feature");
        assert_eq!(branch_ref("refs/heads/master"), "refs/heads/master");
    }

    #[test]
    fn test_page_window() {
        let opts = |page, size| PullRequestListOptions {
            page,
            size,
            ..Default::default()
        };
        assert_eq!(page_window(&opts(0, 0)).unwrap(), None);
        assert_eq!(page_window(&opts(1, 0)).unwrap(), None);
        assert_eq!(page_window(&opts(3, 0)).unwrap(), Some((50, 25)));
        assert_eq!(page_window(&opts(1, 10)).unwrap(), Some((0, 10)));
        assert_eq!(page_window(&opts(4, 10)).unwrap(), Some((30, 10)));
        assert!(matches!(
            page_window(&opts(u32::MAX, 2)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_content_request_rejects_binary() {
        let params = ContentParams {
            message: "binary".to_string(),
            data: vec![0xff, 0xd8, 0xff],
            ..Default::default()
        };
        assert!(matches!(content_request(&params), Err(Error::Validation(_))));
    }

    #[test]
    fn test_config_auth() {
        let http = HttpConfig::default();
        let config = StashConfig {
            url: "http://example.com:7990".to_string(),
            token: None,
            username: Some("jcitizen".to_string()),
        };
        assert!(matches!(
            StashClient::from_config(&config, &http),
            Err(Error::Config(_))
        ));

        let config = StashConfig {
            token: Some("secret".to_string()),
            ..config
        };
        assert!(StashClient::from_config(&config, &http).is_ok());
    }

    // =========================================================================
    // Integration tests with httpmock
    // =========================================================================

    mod integration {
        use super::*;
        use httpmock::prelude::*;

        const DIFF: &str = include_str!("../tests/fixtures/pr.diff");

        fn create_test_client(server: &MockServer) -> StashClient {
            StashClient::with_base_url(server.base_url(), Auth::Bearer("test-token".to_string()))
                .unwrap()
        }

        fn params() -> ContentParams {
            ContentParams {
                message: "my commit message".to_string(),
                data: b"bXkgbmV3IGZpbGUgY29udGVudHM=".to_vec(),
                signature: forgekit_core::Signature {
                    name: "Zaki".to_string(),
                    email: "zaki@example.com".to_string(),
                },
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_find_pull_request() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1")
                    .header("Authorization", "Bearer test-token");
                then.status(200).body(PR_JSON);
            });

            let client = create_test_client(&server);
            let pr = PullRequestService::find(&client, &Context::new(), "PRJ/my-repo", 1)
                .await
                .unwrap();
            assert_eq!(pr, golden_pull_request());
        }

        #[tokio::test]
        async fn test_find_pull_request_error_message() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/7");
                then.status(404).json_body(serde_json::json!({
                    "errors": [{
                        "context": null,
                        "message": "Pull request 7 does not exist in PRJ/my-repo.",
                        "exceptionName": "com.atlassian.bitbucket.pull.NoSuchPullRequestException"
                    }]
                }));
            });

            let client = create_test_client(&server);
            let err = PullRequestService::find(&client, &Context::new(), "PRJ/my-repo", 7)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                Error::NotFound("Pull request 7 does not exist in PRJ/my-repo.".to_string())
            );
        }

        #[tokio::test]
        async fn test_list_pull_requests_body_paging() {
            let server = MockServer::start();
            let pr: serde_json::Value = serde_json::from_str(PR_JSON).unwrap();
            let envelope = serde_json::json!({
                "size": 1,
                "limit": 1,
                "isLastPage": false,
                "values": [pr],
                "start": 1,
                "nextPageStart": 2
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests")
                    .query_param("state", "ALL")
                    .query_param("start", "1")
                    .query_param("limit", "1");
                then.status(200).json_body(envelope);
            });

            let client = create_test_client(&server);
            let page = client
                .list(
                    &Context::new(),
                    "PRJ/my-repo",
                    &PullRequestListOptions {
                        page: 2,
                        size: 1,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            assert_eq!(page.items, vec![golden_pull_request()]);
            assert_eq!(page.pagination.page, 2);
            assert_eq!(page.pagination.next, Some(3));
            assert_eq!(page.pagination.prev, Some(1));
        }

        #[tokio::test]
        async fn test_list_pull_requests_page_without_size() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests")
                    .query_param("state", "ALL")
                    .query_param("start", "25")
                    .query_param("limit", "25");
                then.status(200).json_body(serde_json::json!({
                    "size": 0,
                    "limit": 25,
                    "isLastPage": true,
                    "values": [],
                    "start": 25
                }));
            });

            let client = create_test_client(&server);
            let page = client
                .list(
                    &Context::new(),
                    "PRJ/my-repo",
                    &PullRequestListOptions {
                        page: 2,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            mock.assert();
            assert_eq!(page.pagination.page, 2);
            assert_eq!(page.pagination.prev, Some(1));
        }

        #[tokio::test]
        async fn test_list_pull_requests_page_overflow() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.any_request();
                then.status(200);
            });

            let client = create_test_client(&server);
            let err = client
                .list(
                    &Context::new(),
                    "PRJ/my-repo",
                    &PullRequestListOptions {
                        page: u32::MAX,
                        size: 100,
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Validation(_)));
            mock.assert_hits(0);
        }

        #[tokio::test]
        async fn test_list_pull_requests_last_page() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests")
                    .query_param("state", "OPEN");
                then.status(200).json_body(serde_json::json!({
                    "size": 0,
                    "limit": 25,
                    "isLastPage": true,
                    "values": [],
                    "start": 0
                }));
            });

            let client = create_test_client(&server);
            let page = client
                .list(
                    &Context::new(),
                    "PRJ/my-repo",
                    &PullRequestListOptions {
                        open: true,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            assert!(page.items.is_empty());
            assert!(!page.pagination.has_next());
        }

        #[tokio::test]
        async fn test_create_pull_request() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests")
                    .json_body(serde_json::json!({
                        "title": "Updated Files",
                        "description": "* added LICENSE\r\n* update files",
                        "fromRef": {
                            "id": "refs/heads/feature/x",
                            "repository": {"slug": "my-repo", "project": {"key": "PRJ"}}
                        },
                        "toRef": {
                            "id": "refs/heads/master",
                            "repository": {"slug": "my-repo", "project": {"key": "PRJ"}}
                        }
                    }));
                then.status(201).body(PR_JSON);
            });

            let client = create_test_client(&server);
            let pr = PullRequestService::create(
                &client,
                &Context::new(),
                "PRJ/my-repo",
                &PullRequestInput {
                    title: "Updated Files".to_string(),
                    body: "* added LICENSE\r\n* update files".to_string(),
                    head: "feature/x".to_string(),
                    base: "master".to_string(),
                },
            )
            .await
            .unwrap();

            mock.assert();
            assert_eq!(pr.number, 1);
        }

        #[tokio::test]
        async fn test_decline_and_reopen() {
            let server = MockServer::start();
            let decline = server.mock(|when, then| {
                when.method(POST)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1/decline");
                then.status(200).body(PR_JSON);
            });
            let reopen = server.mock(|when, then| {
                when.method(POST)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1/reopen");
                then.status(200).body(PR_JSON);
            });

            let client = create_test_client(&server);
            let ctx = Context::new();
            client.close(&ctx, "PRJ/my-repo", 1).await.unwrap();
            client.reopen(&ctx, "PRJ/my-repo", 1).await.unwrap();

            decline.assert_hits(1);
            reopen.assert_hits(1);
        }

        #[tokio::test]
        async fn test_merge() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1/merge")
                    .json_body(serde_json::json!({
                        "strategyId": "squash",
                        "message": "Squashed"
                    }));
                then.status(200).body(PR_JSON);
            });

            let client = create_test_client(&server);
            let res = client
                .merge(
                    &Context::new(),
                    "PRJ/my-repo",
                    1,
                    &MergeOptions {
                        method: MergeMethod::Squash,
                        commit_message: Some("Squashed".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            assert_eq!(res.status, 200);
            mock.assert();
        }

        #[tokio::test]
        async fn test_merge_conflict() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1/merge");
                then.status(409).json_body(serde_json::json!({
                    "errors": [{"message": "The pull request has conflicts and cannot be merged."}]
                }));
            });

            let client = create_test_client(&server);
            let err = client
                .merge(&Context::new(), "PRJ/my-repo", 1, &MergeOptions::default())
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(409));
            assert!(err.to_string().contains("has conflicts"));
        }

        #[tokio::test]
        async fn test_list_changes() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1.diff");
                then.status(200).header("content-type", "text/plain").body(DIFF);
            });

            let client = create_test_client(&server);
            let changes = client
                .list_changes(&Context::new(), "PRJ/my-repo", 1, &ListOptions::default())
                .await
                .unwrap();

            assert_eq!(changes.len(), 2);
            assert_eq!(changes[0].path, "README");
            assert_eq!((changes[0].additions, changes[0].deletions), (1, 1));
            assert!(changes[1].binary);
        }

        #[tokio::test]
        async fn test_content_find() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/rest/api/1.0/projects/PRJ/repos/my-repo/raw/README")
                    .query_param("at", "5c64a07cd6c0f21b753bf261ef059c7e7633c50a");
                then.status(200)
                    .header("content-type", "text/plain")
                    .body("Hello World\n");
            });

            let client = create_test_client(&server);
            let ctx = Context::new();
            let first = ContentService::find(
                &client,
                &ctx,
                "PRJ/my-repo",
                "README",
                "5c64a07cd6c0f21b753bf261ef059c7e7633c50a",
            )
            .await
            .unwrap();
            let second = ContentService::find(
                &client,
                &ctx,
                "PRJ/my-repo",
                "README",
                "5c64a07cd6c0f21b753bf261ef059c7e7633c50a",
            )
            .await
            .unwrap();

            assert_eq!(
                first,
                Content {
                    path: "README".to_string(),
                    data: b"Hello World\n".to_vec(),
                    reference: "5c64a07cd6c0f21b753bf261ef059c7e7633c50a".to_string(),
                }
            );
            assert_eq!(first, second);
            mock.assert_hits(2);
        }

        #[tokio::test]
        async fn test_content_create() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(PUT)
                    .path("/rest/api/1.0/projects/octocat/repos/hello-world/browse/README")
                    .header("content-type", "application/json")
                    .body(
                        r#"{"content":"bXkgbmV3IGZpbGUgY29udGVudHM=","message":"my commit message","author":{"name":"Zaki","email":"zaki@example.com"}}"#,
                    );
                then.status(200).json_body(serde_json::json!({
                    "id": "abcdef0123abcdef4567abcdef8987abcdef6543",
                    "displayId": "abcdef0123a",
                    "message": "my commit message"
                }));
            });

            let client = create_test_client(&server);
            let res = ContentService::create(
                &client,
                &Context::new(),
                "octocat/hello-world",
                "README",
                &params(),
            )
            .await
            .unwrap();

            assert_eq!(res.status, 200);
            mock.assert();
        }

        #[tokio::test]
        async fn test_content_update_and_delete_are_unsupported() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.any_request();
                then.status(200);
            });

            let client = create_test_client(&server);
            let ctx = Context::new();
            let params = ContentParams {
                reference: Some("master".to_string()),
                ..params()
            };

            let update = client.update(&ctx, "atlassian/atlaskit", "README", &params).await;
            let delete = client.delete(&ctx, "atlassian/atlaskit", "README", &params).await;

            assert_eq!(update.unwrap_err(), Error::Unsupported);
            assert_eq!(delete.unwrap_err(), Error::Unsupported);
            mock.assert_hits(0);
        }

        #[tokio::test]
        async fn test_invalid_repo_sends_nothing() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.any_request();
                then.status(200);
            });

            let client = create_test_client(&server);
            let err = PullRequestService::find(&client, &Context::new(), "my-repo", 1)
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Validation(_)));
            mock.assert_hits(0);
        }
    }
}
