//! forgekit - one client for pull requests and repository contents across
//! source-code hosts.
//!
//! A [`Client`] wraps exactly one driver, chosen when it is built:
//!
//! ```no_run
//! use forgekit::{Client, Config, Context};
//!
//! # async fn run() -> forgekit::Result<()> {
//! let client = Client::from_settings(&Config::load()?)?;
//! let pr = client.pull_requests().find(&Context::new(), "jcitizen/my-repo", 1).await?;
//! println!("{} is {}", pr.title, pr.state);
//! # Ok(())
//! # }
//! ```
//!
//! Operations the provider lacks fail with [`Error::Unsupported`] before any
//! request is sent; check [`Client::capabilities`] to find out up front.

use std::sync::Arc;

use tracing::debug;

pub use forgekit_core::*;
pub use forgekit_gitea::GiteaClient;
pub use forgekit_gitlab::GitLabClient;
pub use forgekit_stash::StashClient;

/// Service set of one configured provider.
///
/// Cheap to clone; clones share the driver and its cached server probe.
#[derive(Clone)]
pub struct Client {
    kind: ProviderKind,
    capabilities: Capabilities,
    pull_requests: Arc<dyn PullRequestService>,
    contents: Arc<dyn ContentService>,
}

impl Client {
    /// Wrap a driver.
    pub fn new<P: Provider + 'static>(provider: P) -> Self {
        let provider = Arc::new(provider);
        Self {
            kind: provider.kind(),
            capabilities: provider.capabilities(),
            pull_requests: provider.clone(),
            contents: provider,
        }
    }

    /// Build the driver selected by `config`.
    pub fn from_config(config: &ProviderConfig, http: &HttpConfig) -> Result<Self> {
        debug!(provider = config.kind().name(), url = config.url(), "Building client");
        Ok(match config {
            ProviderConfig::Gitea(c) => Self::new(GiteaClient::from_config(c, http)?),
            ProviderConfig::Stash(c) => Self::new(StashClient::from_config(c, http)?),
            ProviderConfig::GitLab(c) => Self::new(GitLabClient::from_config(c, http)?),
        })
    }

    /// Build the client for the single provider configured in `config`.
    pub fn from_settings(config: &Config) -> Result<Self> {
        Self::from_config(&config.provider()?, &config.http)
    }

    pub fn pull_requests(&self) -> &dyn PullRequestService {
        self.pull_requests.as_ref()
    }

    pub fn contents(&self) -> &dyn ContentService {
        self.contents.as_ref()
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether `operation` can be called on this client.
    pub fn supports(&self, operation: Operation) -> bool {
        self.capabilities.supports(operation)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
