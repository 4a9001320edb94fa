use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::{FetchConfig, Result, TaggerError};

/// Downloads each configured feed and writes the raw response body to a
/// local file named after the URL's last path segment.
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Last path segment of the feed URL, used as the local file name.
    pub fn file_name_for(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        let segment = parsed
            .path_segments()
            .and_then(|segments| segments.last().map(|s| s.to_string()))
            .unwrap_or_default();

        if segment.is_empty() {
            return Err(TaggerError::BadFeedUrl(url.to_string()));
        }
        Ok(segment)
    }

    /// Only a plain 200 counts as success; anything else is an error
    /// carrying the URL and status code.
    fn check_status(url: &str, status: reqwest::StatusCode) -> Result<()> {
        if status != reqwest::StatusCode::OK {
            return Err(TaggerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// GET one feed and write the body verbatim to `path`, overwriting any
    /// existing file. Non-200 responses are an error; nothing is written.
    pub async fn fetch_and_save(&self, url: &str, path: &Path) -> Result<()> {
        debug!("Fetching feed: {}", url);
        let response = self.client.get(url).send().await?;
        Self::check_status(url, response.status())?;

        let body = response.bytes().await?;
        tokio::fs::write(path, &body).await?;
        info!("Saved RSS feed from {} to {} ({} bytes)", url, path.display(), body.len());
        Ok(())
    }

    /// Fetch every URL in turn, writing into `dir`. One feed failing never
    /// aborts the batch. Returns the number of files written.
    pub async fn fetch_all(&self, urls: &[&str], dir: &Path) -> usize {
        let mut saved = 0;
        for url in urls {
            let path = match Self::file_name_for(url) {
                Ok(name) => dir.join(name),
                Err(e) => {
                    warn!("Skipping feed {}: {}", url, e);
                    continue;
                }
            };
            match self.fetch_and_save(url, &path).await {
                Ok(()) => saved += 1,
                Err(e) => warn!("Failed to fetch RSS feed from {}: {}", url, e),
            }
        }
        saved
    }
}
