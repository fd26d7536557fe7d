//! Retrieval of the phishing reply address feed.
//!
//! A source is either an HTTP(S) URL or a local file. Each fetch is a single
//! attempt: the feed is refreshed by the next scheduled run, not by retrying.

use reqwest::Client;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PhishTrapError;

const TIMEOUT_SECS: u64 = 30;

/// Maximum feed size (10 MB)
/// The community list has stayed well under 1 MB
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Where a feed is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Local(PathBuf),
}

impl Source {
    /// Anything starting with `http` is fetched over HTTP, the rest is a path
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http") {
            Self::Remote(location.to_string())
        } else {
            Self::Local(PathBuf::from(location))
        }
    }

    /// Whether a local source currently points at a readable file
    pub fn is_available(&self) -> bool {
        match self {
            Self::Remote(_) => true,
            Self::Local(path) => path.is_file(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// HTTP client for fetching feeds
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a new fetcher with default settings
    pub fn new() -> Result<Self, PhishTrapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("phishtrap/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PhishTrapError::Fetch(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Fetch a feed and return its lines
    pub async fn fetch(&self, source: &Source) -> Result<Vec<String>, PhishTrapError> {
        info!("Fetching {}...", source);

        let content = match source {
            Source::Remote(url) => self.fetch_remote(url).await?,
            Source::Local(path) => std::fs::read_to_string(path).map_err(|e| {
                PhishTrapError::Fetch(format!("failed to read {}: {}", path.display(), e))
            })?,
        };

        let lines = split_lines(&content);
        debug!("Fetched {} lines from {}", lines.len(), source);
        Ok(lines)
    }

    async fn fetch_remote(&self, url: &str) -> Result<String, PhishTrapError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PhishTrapError::Fetch(format!("failed to open url {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhishTrapError::Fetch(format!(
                "failed to open url {}: HTTP {}",
                url, status
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length as usize > MAX_FEED_SIZE {
                return Err(PhishTrapError::Fetch(format!(
                    "response too large: {} bytes (max: {} bytes)",
                    content_length, MAX_FEED_SIZE
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| PhishTrapError::Fetch(format!("failed to read response body: {}", e)))?;

        // Content-Length can be absent or wrong
        if body.len() > MAX_FEED_SIZE {
            return Err(PhishTrapError::Fetch(format!(
                "downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_FEED_SIZE
            )));
        }

        Ok(body)
    }
}

/// Split feed content into lines, dropping any stray trailing `\r`
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}
