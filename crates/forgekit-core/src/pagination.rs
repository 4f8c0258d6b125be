//! Pagination normalizer.
//!
//! Providers signal paging in different ways:
//!
//! | Signal | Used by | Example |
//! |--------|---------|---------|
//! | `Link` header | Gitea, GitLab | `<https://host/api?page=2>; rel="next"` |
//! | page echo headers | GitLab, Gitea | `X-Next-Page: 3`, `X-Total-Count: 42` |
//! | body envelope | Bitbucket Server | `{"isLastPage": false, "nextPageStart": 25}` |
//!
//! [`normalize`] folds all of them into one [`PaginationResult`]. A `Link`
//! header wins over page headers, which win over the body envelope. A total
//! count on its own is advisory and never produces a next page, and a full
//! page never implies that another one exists.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::types::ListOptions;

const PAGING_HEADERS: [&str; 8] = [
    "link",
    "x-page",
    "x-per-page",
    "x-next-page",
    "x-prev-page",
    "x-total",
    "x-total-pages",
    "x-total-count",
];

/// Which signal the descriptor was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Link,
    Headers,
    Body,
    #[default]
    None,
}

/// Canonical paging state of one list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    /// Current page (1-based)
    pub page: u32,
    /// Page size in effect, 0 when unknown
    pub size: u32,
    pub next: Option<u32>,
    /// Absolute URL of the next page when the provider supplied one
    pub next_url: Option<String>,
    pub prev: Option<u32>,
    pub first: Option<u32>,
    pub last: Option<u32>,
    /// Total number of items, advisory
    pub total: Option<u64>,
    pub source: PageSource,
    /// Raw provider paging hints, kept for forwarding
    pub hints: Vec<(String, String)>,
}

impl PaginationResult {
    /// Whether the caller could request a further page.
    pub fn has_next(&self) -> bool {
        self.next.is_some() || self.next_url.is_some()
    }

    /// Options that request the following page, if there is one.
    pub fn next_options(&self) -> Option<ListOptions> {
        self.next.map(|page| ListOptions {
            page,
            size: self.size,
        })
    }

    pub fn hint(&self, name: &str) -> Option<&str> {
        self.hints
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One target of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    pub rel: String,
    pub page: Option<u32>,
}

/// Parse an RFC 8288 `Link` header value.
pub fn parse_link_header(value: &str) -> Vec<LinkTarget> {
    let mut targets = Vec::new();
    let mut rest = value;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let url = rest[open + 1..open + close].trim().to_string();
        let after = &rest[open + close + 1..];
        let params_end = after.find('<').unwrap_or(after.len());
        let params = &after[..params_end];
        rest = &after[params_end..];

        for param in params.split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            let val = val.trim().trim_matches('"');
            for rel in val.split_whitespace() {
                targets.push(LinkTarget {
                    url: url.clone(),
                    rel: rel.to_ascii_lowercase(),
                    page: page_param(&url),
                });
            }
        }
    }

    targets
}

fn page_param(link: &str) -> Option<u32> {
    let parsed = url::Url::parse(link)
        .or_else(|_| url::Url::parse("http://localhost/").and_then(|base| base.join(link)))
        .ok()?;
    let page = parsed.query_pairs().find(|(k, _)| k == "page")?;
    page.1.parse().ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_num<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

/// Derive the paging descriptor for a list response.
///
/// `body` is the decoded JSON payload when the provider wraps lists in an
/// envelope; pass `None` for bare arrays.
pub fn normalize(
    headers: &HeaderMap,
    body: Option<&serde_json::Value>,
    requested: ListOptions,
) -> PaginationResult {
    let mut result = PaginationResult {
        page: requested.page.max(1),
        size: requested.size,
        ..Default::default()
    };

    for name in PAGING_HEADERS {
        if let Some(value) = header_str(headers, name) {
            result.hints.push((name.to_string(), value.to_string()));
        }
    }

    // Totals are recorded whatever the signal, but only as a hint.
    result.total = header_num(headers, "x-total").or_else(|| header_num(headers, "x-total-count"));
    if let Some(size) = header_num::<u32>(headers, "x-per-page") {
        result.size = size;
    }
    if let Some(page) = header_num::<u32>(headers, "x-page") {
        result.page = page.max(1);
    }

    if let Some(link) = header_str(headers, "link") {
        apply_link(&mut result, link);
    } else if headers.contains_key("x-next-page") || headers.contains_key("x-page") {
        apply_page_headers(&mut result, headers);
    } else if let Some(envelope) = body.filter(|b| b.get("isLastPage").is_some()) {
        apply_envelope(&mut result, envelope);
    }

    tracing::debug!(
        page = result.page,
        next = ?result.next,
        source = ?result.source,
        "normalized pagination"
    );
    result
}

fn apply_link(result: &mut PaginationResult, link: &str) {
    result.source = PageSource::Link;
    for target in parse_link_header(link) {
        match target.rel.as_str() {
            "next" => {
                result.next = target.page;
                result.next_url = Some(target.url);
            }
            "prev" | "previous" => result.prev = target.page,
            "first" => result.first = target.page,
            "last" => result.last = target.page,
            _ => {}
        }
    }
}

fn apply_page_headers(result: &mut PaginationResult, headers: &HeaderMap) {
    result.source = PageSource::Headers;
    // GitLab sends these as empty strings on the boundaries.
    result.next = header_num(headers, "x-next-page");
    result.prev = header_num(headers, "x-prev-page");
    result.last = header_num(headers, "x-total-pages");
    if result.last.is_some() {
        result.first = Some(1);
    }
}

fn apply_envelope(result: &mut PaginationResult, envelope: &serde_json::Value) {
    result.source = PageSource::Body;

    let field = |name: &str| envelope.get(name).and_then(|v| v.as_u64());
    let is_last = envelope
        .get("isLastPage")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let start = field("start").unwrap_or(0);
    let limit = field("limit").unwrap_or(u64::from(result.size));

    if limit > 0 {
        result.size = u32::try_from(limit).unwrap_or(u32::MAX);
        result.page = u32::try_from(start / limit + 1).unwrap_or(u32::MAX);
        if result.page > 1 {
            result.prev = Some(result.page - 1);
        }
        result.first = Some(1);
    }

    for name in ["isLastPage", "nextPageStart", "start", "limit", "size"] {
        if let Some(value) = envelope.get(name) {
            result.hints.push((name.to_string(), value.to_string()));
        }
    }

    if is_last {
        return;
    }
    if let Some(next_start) = field("nextPageStart") {
        result.next = if limit > 0 {
            u32::try_from(next_start / limit + 1).ok()
        } else {
            Some(result.page + 1)
        };
    }
}
