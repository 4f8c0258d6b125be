//! HTTP transport shared by all drivers.
//!
//! [`Transport`] owns the base URL, the `reqwest` client and the credentials.
//! [`Transport::execute`] performs exactly one round trip and hands back the
//! raw status, headers and body; a non-2xx status is not an error at this
//! layer. Drivers pass the response through [`crate::error::check`] and then
//! decode it.
//!
//! A transport may carry a server probe: one extra request, issued lazily on
//! first use, that learns the server version. The outcome is cached for the
//! lifetime of the transport and never re-issued.

use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::{self, Error, Result};
use crate::pagination::PaginationResult;
use crate::types::Response;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("forgekit/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Call context
// =============================================================================

/// Per-call cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-owned token; cancelling it aborts in-flight requests.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// How requests are authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// Arbitrary header, e.g. `PRIVATE-TOKEN` or `Authorization: token …`
    Token { header: String, value: String },
    Basic { username: String, password: String },
}

impl Auth {
    fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Token { header, value } => builder.header(header.as_str(), value.as_str()),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestBody {
    content_type: String,
    data: Vec<u8>,
}

/// Percent-encode each segment of a slash-separated path, keeping the slashes.
pub fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A request relative to the transport's base URL.
///
/// The path must already be rendered; identifiers inside it are encoded by
/// the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RawRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let data = serde_json::to_vec(body)
            .map_err(|e| Error::Validation(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(RequestBody {
            content_type: "application/json".to_string(),
            data,
        });
        Ok(self)
    }

    pub fn bytes(mut self, data: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = Some(RequestBody {
            content_type: content_type.into(),
            data,
        });
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Status, headers and body of one round trip.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body; failures are [`Error::Decode`], never a status error.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Decode(format!("Failed to parse response: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect()
    }

    /// Response metadata for operations that return no entity.
    pub fn into_response(self, pagination: PaginationResult) -> Response {
        Response {
            status: self.status,
            headers: self.header_pairs(),
            pagination,
        }
    }
}

// =============================================================================
// Server probe
// =============================================================================

/// `major.minor.patch` of a probed server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ServerVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn at_least(&self, major: u64, minor: u64) -> bool {
        *self >= ServerVersion::new(major, minor, 0)
    }
}

impl std::str::FromStr for ServerVersion {
    type Err = Error;

    /// Lenient: `1.21.0+dev-12-gabc`, `v1.2`, `17.9.1-ee` all parse.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        let numeric: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = numeric.split('.').map(|p| p.parse::<u64>().ok());

        let major = parts
            .next()
            .flatten()
            .ok_or_else(|| Error::Decode(format!("Invalid server version: {:?}", s)))?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Ok(ServerVersion::new(major, minor, patch))
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Outcome of a successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: ServerVersion,
    /// Version string as reported by the server
    pub raw: String,
}

#[derive(Debug)]
struct ServerProbe {
    path: String,
    outcome: OnceCell<Result<ServerInfo>>,
}

// =============================================================================
// Transport
// =============================================================================

/// Base URL + HTTP client + credentials + optional server probe.
#[derive(Debug)]
pub struct Transport {
    base_url: String,
    client: reqwest::Client,
    auth: Auth,
    probe: Option<ServerProbe>,
}

impl Transport {
    /// Create a transport with a default HTTP client.
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        Self::from_config(base_url, auth, &HttpConfig::default())
    }

    /// Create a transport whose HTTP client follows the `[http]` settings.
    pub fn from_config(base_url: impl Into<String>, auth: Auth, http: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(
            http.user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );
        if let Some(secs) = http.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client, auth))
    }

    /// Create a transport around an existing client.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client, auth: Auth) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            auth,
            probe: None,
        }
    }

    /// Enable the lazy server probe, answered by `GET {path}` with a
    /// `{"version": "..."}` payload.
    pub fn with_probe(mut self, path: impl Into<String>) -> Self {
        self.probe = Some(ServerProbe {
            path: path.into(),
            outcome: OnceCell::new(),
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Perform one round trip.
    ///
    /// Fails only with [`Error::Transport`] or [`Error::Cancelled`]; any HTTP
    /// status, including errors, is returned as a response.
    pub async fn execute(&self, ctx: &Context, request: RawRequest) -> Result<RawResponse> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "forge request");

        let mut builder = self
            .auth
            .apply(self.client.request(request.method.clone(), &url));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, body.content_type).body(body.data);
        }
        if let Some(timeout) = ctx.timeout() {
            builder = builder.timeout(timeout);
        }

        let round_trip = async {
            let response = builder.send().await.map_err(Error::from_transport)?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(Error::from_transport)?;
            Ok::<_, Error>(RawResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        };

        tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => {
                debug!(url = %url, "forge request cancelled");
                Err(Error::Cancelled)
            }
            result = round_trip => result,
        }
    }

    /// Server version, probing on first use.
    ///
    /// Concurrent first callers share one probe request. A failed probe is
    /// cached like a successful one and reported as [`Error::Transport`]; a
    /// cancelled probe is not cached.
    pub async fn server_info(&self, ctx: &Context) -> Result<ServerInfo> {
        let probe = self
            .probe
            .as_ref()
            .ok_or_else(|| Error::Config("no server probe configured".to_string()))?;

        // Waiting on another caller's probe still honours our own token
        let init = probe.outcome.get_or_try_init(|| async {
            match self.run_probe(ctx, &probe.path).await {
                Err(Error::Cancelled) => Err(Error::Cancelled),
                outcome => Ok(outcome),
            }
        });
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => Err(Error::Cancelled),
            outcome = init => outcome,
        }?;

        match outcome {
            Ok(info) => Ok(info.clone()),
            Err(err) => Err(Error::Transport(format!(
                "server version probe failed: {}",
                err
            ))),
        }
    }

    pub async fn server_version(&self, ctx: &Context) -> Result<ServerVersion> {
        self.server_info(ctx).await.map(|info| info.version)
    }

    /// Cached probe result, without triggering the probe.
    pub fn cached_server_version(&self) -> Option<ServerVersion> {
        self.probe
            .as_ref()
            .and_then(|p| p.outcome.get())
            .and_then(|outcome| outcome.as_ref().ok())
            .map(|info| info.version)
    }

    async fn run_probe(&self, ctx: &Context, path: &str) -> Result<ServerInfo> {
        let outcome = async {
            let response = error::check(self.execute(ctx, RawRequest::get(path)).await?)?;
            let payload: serde_json::Value = response.json()?;
            let raw = payload
                .get("version")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::Decode("version payload has no version field".into()))?;
            Ok::<_, Error>(ServerInfo {
                version: raw.parse()?,
                raw: raw.to_string(),
            })
        }
        .await;

        match &outcome {
            Ok(info) => info!(version = %info.raw, base_url = %self.base_url, "probed server version"),
            Err(Error::Cancelled) => {}
            Err(err) => warn!(error = %err, base_url = %self.base_url, "server version probe failed"),
        }
        outcome
    }
}
