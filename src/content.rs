//! Choosing the Markdown a poster displays.
//!
//! Sources are tried in a fixed order and the first one that yields a value
//! wins:
//!
//! 1. `md` query parameter: literal Markdown, percent-decoded
//! 2. `md_url` query parameter: fetched as plain text
//! 3. `content.markdown` from the poster config
//! 4. the built-in sample document
//!
//! Empty values count as absent. A failed `md_url` fetch shows the sample
//! document, not the configured Markdown.

use crate::config::RawConfig;
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::{Host, Url};

/// Shown when nothing else supplies Markdown, and when a fetch fails.
pub const SAMPLE_MARKDOWN: &str = include_str!("../static/sample.md");

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("refusing to fetch {url}: {reason}")]
    Rejected { url: String, reason: &'static str },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} did not return UTF-8 text")]
    NotText { url: String },
    #[error("{url} returned more than {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// The query parameters a poster page understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosterQuery {
    pub md: Option<String>,
    pub md_url: Option<String>,
}

impl PosterQuery {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Only the first occurrence of a repeated parameter counts.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return query;
        };
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "md" if query.md.is_none() => query.md = Some(value.into_owned()),
                "md_url" if query.md_url.is_none() => query.md_url = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }
}

/// Decode percent escapes, failing on malformed escapes or invalid UTF-8.
///
/// Unlike a lenient decoder, a `%` that is not followed by two hex digits is
/// an error rather than a literal.
pub fn decode_uri_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(s).decode_utf8().ok().map(|c| c.into_owned())
}

/// Where a poster's Markdown comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    QueryText(String),
    RemoteUrl(String),
    ConfigText(String),
    Sample,
}

type Provider = fn(&PosterQuery, Option<&RawConfig>) -> Option<ContentSource>;

/// Providers in priority order.
const PROVIDERS: [Provider; 3] = [query_text, remote_url, config_text];

fn query_text(query: &PosterQuery, _: Option<&RawConfig>) -> Option<ContentSource> {
    let raw = query.md.as_deref().filter(|s| !s.is_empty())?;
    let text = decode_uri_component(raw).unwrap_or_else(|| {
        debug!("md parameter is not decodable, showing it verbatim");
        raw.to_string()
    });
    Some(ContentSource::QueryText(text))
}

fn remote_url(query: &PosterQuery, _: Option<&RawConfig>) -> Option<ContentSource> {
    let url = query.md_url.as_deref().filter(|s| !s.is_empty())?;
    Some(ContentSource::RemoteUrl(url.to_string()))
}

fn config_text(_: &PosterQuery, config: Option<&RawConfig>) -> Option<ContentSource> {
    config?.markdown().map(ContentSource::ConfigText)
}

/// Pick the content source for a newly mounted poster.
pub fn select_source(query: &PosterQuery, config: Option<&RawConfig>) -> ContentSource {
    PROVIDERS
        .iter()
        .find_map(|provider| provider(query, config))
        .unwrap_or(ContentSource::Sample)
}

impl ContentSource {
    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            ContentSource::QueryText(_) => "md",
            ContentSource::RemoteUrl(_) => "md_url",
            ContentSource::ConfigText(_) => "content.markdown",
            ContentSource::Sample => "sample",
        }
    }

    /// The Markdown, if it is available without fetching.
    pub fn immediate(&self) -> Option<String> {
        match self {
            ContentSource::QueryText(text) | ContentSource::ConfigText(text) => Some(text.clone()),
            ContentSource::Sample => Some(SAMPLE_MARKDOWN.to_string()),
            ContentSource::RemoteUrl(_) => None,
        }
    }

    /// Produce the Markdown, fetching if needed. Never fails: a fetch error
    /// yields the sample document.
    pub async fn resolve(self, fetcher: &dyn MarkdownFetcher) -> String {
        match self {
            ContentSource::RemoteUrl(url) => match fetcher.fetch_text(&url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(url = %url, error = %e, "md_url fetch failed, showing sample");
                    SAMPLE_MARKDOWN.to_string()
                }
            },
            other => other.immediate().unwrap_or_default(),
        }
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Fetches remote Markdown as text.
#[async_trait]
pub trait MarkdownFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Accept only absolute `http`/`https` URLs.
///
/// This checks the URL's shape only. Where it may point is decided by
/// [`check_destination`], which [`HttpFetcher`] applies on top.
pub fn parse_remote_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|_| FetchError::Rejected {
        url: raw.to_string(),
        reason: "not an absolute URL",
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(FetchError::Rejected {
            url: raw.to_string(),
            reason: "only http and https are fetched",
        }),
    }
}

/// Upper bound on a fetched Markdown body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// What [`HttpFetcher`] is allowed to fetch.
///
/// The fetch runs on the server on behalf of whoever sent the page request,
/// so by default it refuses anything that is not a public address:
/// loopback, private (RFC 1918, IPv6 unique local), link-local, carrier-grade
/// NAT, unspecified and broadcast addresses, and `localhost` names. The check
/// covers IP literals in the URL, every address a host name resolves to, and
/// every redirect target. `allow_private` lifts it for local setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub allow_private: bool,
    pub max_body: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            allow_private: false,
            max_body: MAX_BODY_BYTES,
        }
    }
}

/// Whether `ip` is reachable on the public internet.
pub fn is_public_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let shared = a == 100 && (64..128).contains(&b);
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || shared)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_address(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let unique_local = first & 0xfe00 == 0xfc00;
            let link_local = first & 0xffc0 == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// Refuse URLs whose host is a non-public IP literal or a `localhost` name.
///
/// Host names that merely resolve to internal addresses are caught later by
/// the fetcher's resolver.
pub fn check_destination(url: &Url, policy: FetchPolicy) -> Result<(), FetchError> {
    if policy.allow_private {
        return Ok(());
    }
    let internal = match url.host() {
        Some(Host::Ipv4(ip)) => !is_public_address(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => !is_public_address(IpAddr::V6(ip)),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
        None => true,
    };
    if internal {
        return Err(FetchError::Rejected {
            url: url.to_string(),
            reason: "private and loopback addresses are not fetched",
        });
    }
    Ok(())
}

/// DNS resolver that drops every non-public address from the answer.
struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let public: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|addr| is_public_address(addr.ip()))
                .collect();
            if public.is_empty() {
                return Err(format!("{host} has no public address").into());
            }
            let addrs: Addrs = Box::new(public.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// [`MarkdownFetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, policy: FetchPolicy) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("md-poster/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);
        if !policy.allow_private {
            builder = builder
                .dns_resolver(Arc::new(PublicResolver))
                .redirect(Policy::custom(move |attempt| {
                    if attempt.previous().len() >= MAX_REDIRECTS {
                        attempt.error("too many redirects")
                    } else if check_destination(attempt.url(), policy).is_err() {
                        attempt.error("redirect to a private address")
                    } else {
                        attempt.follow()
                    }
                }));
        }
        Ok(Self {
            client: builder.build()?,
            policy,
        })
    }
}

const MAX_REDIRECTS: usize = 10;

#[async_trait]
impl MarkdownFetcher for HttpFetcher {
    async fn fetch_text(&self, raw: &str) -> Result<String, FetchError> {
        let url = parse_remote_url(raw)?;
        check_destination(&url, self.policy)?;
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: raw.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: raw.to_string(),
            limit: self.policy.max_body,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.policy.max_body as u64)
        {
            return Err(too_large());
        }
        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.policy.max_body {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        String::from_utf8(body).map_err(|_| FetchError::NotText {
            url: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn query(md: Option<&str>, md_url: Option<&str>) -> PosterQuery {
        PosterQuery {
            md: md.map(str::to_string),
            md_url: md_url.map(str::to_string),
        }
    }

    // =========================================================================
    // Query parsing and decoding
    // =========================================================================

    #[test]
    fn parse_query_decodes_once() {
        let q = PosterQuery::parse(Some("md=Hello%20World&md_url=https%3A%2F%2Fa.test%2Fx.md"));
        assert_eq!(q.md.as_deref(), Some("Hello World"));
        assert_eq!(q.md_url.as_deref(), Some("https://a.test/x.md"));
    }

    #[test]
    fn parse_query_first_occurrence_wins() {
        let q = PosterQuery::parse(Some("md=first&md=second"));
        assert_eq!(q.md.as_deref(), Some("first"));
    }

    #[test]
    fn parse_query_absent() {
        assert_eq!(PosterQuery::parse(None), PosterQuery::default());
        assert_eq!(PosterQuery::parse(Some("")), PosterQuery::default());
    }

    #[test]
    fn decode_uri_component_cases() {
        assert_eq!(decode_uri_component("Hello%20World").as_deref(), Some("Hello World"));
        assert_eq!(decode_uri_component("%E4%BD%A0%E5%A5%BD").as_deref(), Some("你好"));
        assert_eq!(decode_uri_component("plain").as_deref(), Some("plain"));
        assert_eq!(decode_uri_component("100%"), None);
        assert_eq!(decode_uri_component("%zz"), None);
        assert_eq!(decode_uri_component("%FF"), None);
    }

    // =========================================================================
    // Source selection
    // =========================================================================

    #[test]
    fn md_parameter_shown_decoded() {
        let q = PosterQuery::parse(Some("md=Hello%20World"));
        assert_eq!(
            select_source(&q, None),
            ContentSource::QueryText("Hello World".into())
        );
    }

    #[test]
    fn undecodable_md_shown_verbatim() {
        // The query layer turns %25 into a bare %, which no longer decodes.
        let q = PosterQuery::parse(Some("md=50%25%20off"));
        assert_eq!(
            select_source(&q, None),
            ContentSource::QueryText("50% off".into())
        );
    }

    #[test]
    fn md_beats_md_url_and_config() {
        let config = config_from("content:\n  markdown: from config\n");
        let q = query(Some("from query"), Some("https://a.test/x.md"));
        assert_eq!(
            select_source(&q, Some(&config)),
            ContentSource::QueryText("from query".into())
        );
    }

    #[test]
    fn empty_md_falls_through_to_md_url() {
        let q = query(Some(""), Some("https://a.test/x.md"));
        assert_eq!(
            select_source(&q, None),
            ContentSource::RemoteUrl("https://a.test/x.md".into())
        );
    }

    #[test]
    fn config_markdown_used_without_query() {
        let config = config_from("content:\n  markdown: \"# From config\"\n");
        assert_eq!(
            select_source(&PosterQuery::default(), Some(&config)),
            ContentSource::ConfigText("# From config".into())
        );
    }

    #[test]
    fn sample_when_nothing_else() {
        assert_eq!(select_source(&PosterQuery::default(), None), ContentSource::Sample);
        let config = config_from("content:\n  markdown: \"\"\n");
        assert_eq!(
            select_source(&PosterQuery::default(), Some(&config)),
            ContentSource::Sample
        );
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[tokio::test]
    async fn remote_source_uses_fetched_text() {
        let fetcher = StaticFetcher::new("# Remote");
        let text = ContentSource::RemoteUrl("https://a.test/x.md".into())
            .resolve(&fetcher)
            .await;
        assert_eq!(text, "# Remote");
    }

    #[tokio::test]
    async fn failed_fetch_shows_sample_not_config() {
        let config = config_from("content:\n  markdown: from config\n");
        let q = query(None, Some("https://a.test/missing.md"));
        let source = select_source(&q, Some(&config));
        let text = source.resolve(&FailingFetcher).await;
        assert_eq!(text, SAMPLE_MARKDOWN);
    }

    #[tokio::test]
    async fn immediate_sources_ignore_fetcher() {
        let text = ContentSource::ConfigText("cfg".into())
            .resolve(&FailingFetcher)
            .await;
        assert_eq!(text, "cfg");
    }

    // =========================================================================
    // URL policy
    // =========================================================================

    #[test]
    fn remote_url_policy() {
        assert!(parse_remote_url("https://example.com/post.md").is_ok());
        assert!(parse_remote_url("http://127.0.0.1:8080/a.md").is_ok());
        assert!(matches!(
            parse_remote_url("/relative.md"),
            Err(FetchError::Rejected { .. })
        ));
        assert!(matches!(
            parse_remote_url("file:///etc/passwd"),
            Err(FetchError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn http_fetcher_rejects_bad_scheme_without_network() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1), FetchPolicy::default()).unwrap();
        let result = fetcher.fetch_text("ftp://example.com/a.md").await;
        assert!(matches!(result, Err(FetchError::Rejected { .. })));
    }

    // =========================================================================
    // Destination policy
    // =========================================================================

    #[test]
    fn public_addresses() {
        for ip in ["8.8.8.8", "93.184.216.34", "2606:4700::1111"] {
            assert!(is_public_address(ip.parse().unwrap()), "{ip}");
        }
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "255.255.255.255",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
        ] {
            assert!(!is_public_address(ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn destination_rejects_internal_hosts_by_default() {
        let policy = FetchPolicy::default();
        for raw in [
            "http://127.0.0.1:8080/a.md",
            "http://[::1]/a.md",
            "http://10.0.0.5/a.md",
            "http://169.254.169.254/latest/meta-data",
            "http://localhost:3000/a.md",
            "http://api.localhost/a.md",
        ] {
            let url = parse_remote_url(raw).unwrap();
            assert!(
                matches!(check_destination(&url, policy), Err(FetchError::Rejected { .. })),
                "{raw}"
            );
        }
        let url = parse_remote_url("https://example.com/post.md").unwrap();
        assert!(check_destination(&url, policy).is_ok());
    }

    #[test]
    fn destination_allows_internal_hosts_when_enabled() {
        let policy = FetchPolicy {
            allow_private: true,
            ..FetchPolicy::default()
        };
        let url = parse_remote_url("http://127.0.0.1:8080/a.md").unwrap();
        assert!(check_destination(&url, policy).is_ok());
    }

    #[tokio::test]
    async fn http_fetcher_refuses_loopback_by_default() {
        let addr = serve_raw_http(b"# local".to_vec(), true).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), FetchPolicy::default()).unwrap();
        let result = fetcher.fetch_text(&format!("http://{addr}/a.md")).await;
        assert!(matches!(result, Err(FetchError::Rejected { .. })));
    }

    #[tokio::test]
    async fn resolver_drops_loopback_answers() {
        let name: Name = "localhost".parse().unwrap();
        assert!(PublicResolver.resolve(name).await.is_err());
    }

    // =========================================================================
    // Body limit
    // =========================================================================

    fn local_policy(max_body: usize) -> FetchPolicy {
        FetchPolicy {
            allow_private: true,
            max_body,
        }
    }

    #[tokio::test]
    async fn http_fetcher_reads_small_body() {
        let addr = serve_raw_http(b"# Remote\n".to_vec(), true).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), local_policy(1024)).unwrap();
        let text = fetcher.fetch_text(&format!("http://{addr}/a.md")).await.unwrap();
        assert_eq!(text, "# Remote\n");
    }

    #[tokio::test]
    async fn http_fetcher_rejects_declared_oversized_body() {
        let addr = serve_raw_http(vec![b'a'; 4096], true).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), local_policy(1024)).unwrap();
        let result = fetcher.fetch_text(&format!("http://{addr}/a.md")).await;
        assert!(matches!(result, Err(FetchError::TooLarge { limit: 1024, .. })));
    }

    #[tokio::test]
    async fn http_fetcher_caps_body_without_length() {
        let addr = serve_raw_http(vec![b'a'; 64 * 1024], false).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), local_policy(1024)).unwrap();
        let result = fetcher.fetch_text(&format!("http://{addr}/a.md")).await;
        assert!(matches!(result, Err(FetchError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn oversized_body_shows_sample() {
        let addr = serve_raw_http(vec![b'a'; 4096], true).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), local_policy(1024)).unwrap();
        let text = ContentSource::RemoteUrl(format!("http://{addr}/a.md"))
            .resolve(&fetcher)
            .await;
        assert_eq!(text, SAMPLE_MARKDOWN);
    }

    #[test]
    fn sample_is_not_empty() {
        assert!(SAMPLE_MARKDOWN.trim_start().starts_with('#'));
    }
}
