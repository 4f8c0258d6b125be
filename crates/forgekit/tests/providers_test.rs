//! Behaviour every driver must share, exercised through [`forgekit::Client`].
//!
//! Each case points one driver at its own `MockServer` and checks the
//! provider-neutral guarantees: gated operations never touch the network,
//! empty 2xx merges succeed, reads are repeatable and cancellation is
//! reported as such.

use forgekit::config::{GiteaConfig, GitLabConfig, StashConfig};
use forgekit::{
    Client, Config, ContentParams, Context, Error, HttpConfig, MergeOptions, Operation,
    ProviderConfig, ProviderKind, Signature,
};
use httpmock::prelude::*;
use tokio_util::sync::CancellationToken;

/// One driver wired to a mock server.
struct Case {
    client: Client,
    repo: &'static str,
    /// GitLab accepts merges with PUT, the others with POST
    merge_with_put: bool,
    merge_path: &'static str,
    raw_readme: &'static str,
}

fn gitea(server: &MockServer) -> Case {
    let config = ProviderConfig::Gitea(GiteaConfig {
        url: server.base_url(),
        token: Some("test-token".to_string()),
    });
    Case {
        client: Client::from_config(&config, &HttpConfig::default()).unwrap(),
        repo: "jcitizen/my-repo",
        merge_with_put: false,
        merge_path: "/api/v1/repos/jcitizen/my-repo/pulls/1/merge",
        raw_readme: "/api/v1/repos/jcitizen/my-repo/raw/README",
    }
}

fn stash(server: &MockServer) -> Case {
    let config = ProviderConfig::Stash(StashConfig {
        url: server.base_url(),
        token: Some("test-token".to_string()),
        username: None,
    });
    Case {
        client: Client::from_config(&config, &HttpConfig::default()).unwrap(),
        repo: "PRJ/my-repo",
        merge_with_put: false,
        merge_path: "/rest/api/1.0/projects/PRJ/repos/my-repo/pull-requests/1/merge",
        raw_readme: "/rest/api/1.0/projects/PRJ/repos/my-repo/raw/README",
    }
}

fn gitlab(server: &MockServer) -> Case {
    let config = ProviderConfig::GitLab(GitLabConfig {
        url: server.base_url(),
        token: Some("test-token".to_string()),
    });
    Case {
        client: Client::from_config(&config, &HttpConfig::default()).unwrap(),
        repo: "123",
        merge_with_put: true,
        merge_path: "/api/v4/projects/123/merge_requests/1/merge",
        raw_readme: "/api/v4/projects/123/repository/files/README/raw",
    }
}

fn cases(server: &MockServer) -> Vec<Case> {
    vec![gitea(server), stash(server), gitlab(server)]
}

fn params() -> ContentParams {
    ContentParams {
        reference: Some("master".to_string()),
        message: "my commit message".to_string(),
        data: b"bXkgbmV3IGZpbGUgY29udGVudHM=".to_vec(),
        sha: Some("7638417db6d59f3c431d3e1f261cc637155684cd".to_string()),
        signature: Signature {
            name: "Zaki".to_string(),
            email: "zaki@example.com".to_string(),
        },
    }
}

/// Every operation a driver gates off fails with the sentinel before any
/// request is made.
#[tokio::test]
async fn test_gated_operations_send_nothing() {
    for kind in ProviderKind::ALL {
        let server = MockServer::start();
        let catch_all = server.mock(|when, then| {
            when.any_request();
            then.status(200);
        });
        let case = cases(&server)
            .into_iter()
            .find(|c| c.client.kind() == kind)
            .unwrap();
        let ctx = Context::new();

        for op in case.client.capabilities().unsupported() {
            let result = match op {
                Operation::ContentUpdate => {
                    case.client
                        .contents()
                        .update(&ctx, case.repo, "README", &params())
                        .await
                }
                Operation::ContentDelete => {
                    case.client
                        .contents()
                        .delete(&ctx, case.repo, "README", &params())
                        .await
                }
                other => panic!("{} gates {} without a test", kind.name(), other.name()),
            };
            assert_eq!(result.unwrap_err(), Error::Unsupported, "{}", kind.name());
        }

        catch_all.assert_hits(0);
    }
}

#[test]
fn test_only_stash_gates_operations() {
    assert!(ProviderKind::Gitea.capabilities().unsupported().is_empty());
    assert!(ProviderKind::GitLab.capabilities().unsupported().is_empty());
    assert_eq!(
        ProviderKind::Stash.capabilities().unsupported(),
        vec![Operation::ContentUpdate, Operation::ContentDelete]
    );
}

#[tokio::test]
async fn test_merge_no_content_is_success() {
    let server = MockServer::start();
    for case in cases(&server) {
        let mock = server.mock(|when, then| {
            let when = if case.merge_with_put {
                when.method(PUT)
            } else {
                when.method(POST)
            };
            when.path(case.merge_path);
            then.status(204);
        });

        let response = case
            .client
            .pull_requests()
            .merge(&Context::new(), case.repo, 1, &MergeOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status, 204, "{}", case.client.kind().name());
        mock.assert();
    }
}

#[tokio::test]
async fn test_content_find_is_repeatable() {
    for kind in ProviderKind::ALL {
        let server = MockServer::start();
        // Gitea probes its version before choosing the raw endpoint
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/version");
            then.status(200).json_body(serde_json::json!({"version": "1.21.0"}));
        });
        let case = cases(&server)
            .into_iter()
            .find(|c| c.client.kind() == kind)
            .unwrap();
        let raw = server.mock(|when, then| {
            when.method(GET).path(case.raw_readme);
            then.status(200).body("Hello World\n");
        });

        let ctx = Context::new();
        let first = case
            .client
            .contents()
            .find(&ctx, case.repo, "README", "")
            .await
            .unwrap();
        let second = case
            .client
            .contents()
            .find(&ctx, case.repo, "README", "")
            .await
            .unwrap();

        assert_eq!(first, second, "{}", kind.name());
        assert_eq!(first.data, b"Hello World\n".to_vec());
        raw.assert_hits(2);
    }
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });
    let token = CancellationToken::new();
    token.cancel();
    let ctx = Context::new().with_cancellation(token);

    for case in cases(&server) {
        let kind = case.client.kind().name();
        let find = case.client.pull_requests().find(&ctx, case.repo, 1).await;
        assert_eq!(find.unwrap_err(), Error::Cancelled, "{}", kind);

        let content = case
            .client
            .contents()
            .find(&ctx, case.repo, "README", "master")
            .await;
        assert_eq!(content.unwrap_err(), Error::Cancelled, "{}", kind);
    }

    catch_all.assert_hits(0);
}

#[tokio::test]
async fn test_not_found_across_providers() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.any_request();
        then.status(404).body("");
    });

    for case in cases(&server) {
        let err = case
            .client
            .pull_requests()
            .find(&Context::new(), case.repo, 99)
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}: {:?}", case.client.kind().name(), err);
        assert_eq!(err.status(), Some(404));
    }
}

#[tokio::test]
async fn test_client_from_config_file() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.set("gitea.url", &server.base_url()).unwrap();
    config.set("gitea.token", "test-token").unwrap();
    config.set("http.timeout_secs", "30").unwrap();
    config.save_to(&path).unwrap();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/repos/jcitizen/my-repo/pulls/1/merge")
            .header("Authorization", "token test-token");
        then.status(200);
    });

    let client = Client::from_settings(&Config::load_from(&path).unwrap()).unwrap();
    assert_eq!(client.kind(), ProviderKind::Gitea);
    client
        .pull_requests()
        .merge(&Context::new(), "jcitizen/my-repo", 1, &MergeOptions::default())
        .await
        .unwrap();
    mock.assert();
}
