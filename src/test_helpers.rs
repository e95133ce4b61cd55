//! Shared test utilities for the md-poster test suite.
//!
//! Provides a fixed date for deterministic `{{date}}` output, a shortcut for
//! building configs from YAML snippets, canned [`MarkdownFetcher`]s so
//! nothing touches the network, and a throwaway loopback HTTP server for
//! exercising the real fetcher.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let config = config_from("poster:\n  theme: keji02\n");
//! let p = ResolvedPresentation::resolve(Some(&config), test_date());
//!
//! let source = ContentSource::RemoteUrl("https://a.test/x.md".into());
//! let text = source.resolve(&FailingFetcher).await;
//! assert_eq!(text, SAMPLE_MARKDOWN);
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::RawConfig;
use crate::content::{FetchError, MarkdownFetcher};

// =========================================================================
// Fixtures
// =========================================================================

/// The date every test renders against: 2024-05-07.
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()
}

/// Parse a YAML snippet into a config. Panics if the snippet is not a mapping.
pub fn config_from(yaml: &str) -> RawConfig {
    RawConfig::from_yaml_str(yaml)
        .unwrap_or_else(|| panic!("test config is not a YAML mapping:\n{yaml}"))
}

/// Write `text` to `dir/name`, creating `dir` if needed.
pub fn write_markdown(dir: &Path, name: &str, text: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

// =========================================================================
// Fetchers
// =========================================================================

/// Answers every URL with the same body.
pub struct StaticFetcher {
    body: String,
}

impl StaticFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl MarkdownFetcher for StaticFetcher {
    async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
        Ok(self.body.clone())
    }
}

/// Fails every fetch as if the server were unavailable.
pub struct FailingFetcher;

#[async_trait]
impl MarkdownFetcher for FailingFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

/// Answers with a fixed body after a delay. Pair with a paused clock.
pub struct SlowFetcher {
    body: String,
    delay: Duration,
}

impl SlowFetcher {
    pub fn new(body: &str, delay: Duration) -> Self {
        Self {
            body: body.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl MarkdownFetcher for SlowFetcher {
    async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.body.clone())
    }
}

// =========================================================================
// Loopback HTTP server
// =========================================================================

/// Serve `body` with status 200 to every connection on a loopback port.
///
/// With `with_length` false the response has no `Content-Length` and the
/// body ends when the connection closes.
pub async fn serve_raw_http(body: Vec<u8>, with_length: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let length = if with_length {
                    format!("Content-Length: {}\r\n", body.len())
                } else {
                    String::new()
                };
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/markdown\r\n{length}Connection: close\r\n\r\n"
                );
                // The client may hang up early once it has seen enough.
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}
