//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings and timeouts
//! - GET requests with Content-Type checks
//! - The fetch engine that walks a site breadth-first and streams fetched
//!   pages to the pipeline

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::frontier::Frontier;
use crate::extract::discover_links;
use crate::url::{extract_host, matches_any, parse_url, same_host};
use crate::SiteGraphError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use url::Url;

/// An HTML document fetched by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL that was requested
    pub request_url: String,
    /// URL the document was finally loaded from, after redirects
    pub loaded_url: String,
    /// Response body
    pub html: String,
}

/// Items the engine sends to the pipeline
pub type FetchItem = Result<FetchedPage, SiteGraphError>;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success(FetchedPage),

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Non-success HTTP status
    HttpError { status_code: u16 },

    /// Network error (connection refused, timeout, etc.)
    NetworkError { error: String },
}

/// Counters for one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests issued
    pub requested: usize,
    /// HTML pages handed to the pipeline
    pub delivered: usize,
    /// Responses that were not usable HTML
    pub skipped: usize,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeouts
/// * `user_agent` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

/// Fetches a single URL
///
/// Redirects are followed by the client. A page is only returned when the
/// final response is a 2xx with an HTML Content-Type. One attempt is made;
/// failures are reported, never retried.
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchResult::NetworkError {
                error: e.to_string(),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return FetchResult::ContentMismatch { content_type };
    }

    let loaded_url = response.url().to_string();

    match response.text().await {
        Ok(html) => FetchResult::Success(FetchedPage {
            request_url: url.to_string(),
            loaded_url,
            html,
        }),
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}

/// Breadth-first site fetcher feeding a crawl pipeline
pub struct HttpFetchEngine {
    client: Client,
    max_requests: usize,
    max_concurrency: usize,
    allowed_domains: Vec<String>,
}

impl HttpFetchEngine {
    /// Creates an engine from configuration
    pub fn new(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, SiteGraphError> {
        let client = build_http_client(crawler, user_agent)?;
        Ok(Self::with_client(client, crawler))
    }

    /// Creates an engine around an existing client
    pub fn with_client(client: Client, crawler: &CrawlerConfig) -> Self {
        Self {
            client,
            max_requests: crawler.max_requests_per_crawl as usize,
            max_concurrency: crawler.max_concurrency.max(1) as usize,
            allowed_domains: crawler.allowed_domains.clone(),
        }
    }

    /// Whether links found on `page` pointing at `link` should be fetched
    ///
    /// With no `allowed-domains` the crawl stays on the page's own host. A
    /// non-empty list replaces that rule: only hosts matching a pattern are
    /// followed, including the page's own.
    fn should_follow(&self, page: &Url, link: &Url) -> bool {
        if self.allowed_domains.is_empty() {
            return same_host(page, link);
        }

        extract_host(link)
            .map(|host| matches_any(self.allowed_domains.as_slice(), &host))
            .unwrap_or(false)
    }

    /// Crawls from `seeds`, sending every fetched HTML page down `tx`
    ///
    /// A seed that is not an absolute http(s) URL is sent as an error item
    /// and ends the run before anything is fetched. The run also ends when
    /// the frontier is exhausted, the request cap is reached, or the
    /// receiver is dropped.
    pub async fn run(&self, seeds: &[String], tx: mpsc::Sender<FetchItem>) -> FetchStats {
        self.run_capped(seeds, self.max_requests, tx).await
    }

    /// Like [`run`](Self::run), with `max_requests` in place of the
    /// configured request cap
    pub async fn run_capped(
        &self,
        seeds: &[String],
        max_requests: usize,
        tx: mpsc::Sender<FetchItem>,
    ) -> FetchStats {
        let mut stats = FetchStats::default();
        let mut frontier = Frontier::new();

        for seed in seeds {
            match parse_url(seed) {
                Ok(url) => {
                    frontier.push(url);
                }
                Err(e) => {
                    tracing::error!("Invalid start URL '{}': {}", seed, e);
                    let _ = tx.send(Err(e.into())).await;
                    return stats;
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(Url, FetchResult)> = JoinSet::new();

        loop {
            // Fill free fetch slots from the frontier
            while stats.requested < max_requests
                && !frontier.is_empty()
                && semaphore.available_permits() > 0
            {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                let Some(url) = frontier.pop() else {
                    break;
                };

                stats.requested += 1;
                tracing::debug!("Fetching {}", url);

                let client = self.client.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = fetch_url(&client, &url).await;
                    (url, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            let (url, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::warn!("Fetch task failed: {}", e);
                    stats.skipped += 1;
                    continue;
                }
            };

            let page = match result {
                FetchResult::Success(page) => page,
                FetchResult::ContentMismatch { content_type } => {
                    tracing::debug!("Skipping {}: not HTML ({})", url, content_type);
                    stats.skipped += 1;
                    continue;
                }
                FetchResult::HttpError { status_code } => {
                    tracing::warn!("Skipping {}: HTTP {}", url, status_code);
                    stats.skipped += 1;
                    continue;
                }
                FetchResult::NetworkError { error } => {
                    tracing::warn!("Skipping {}: {}", url, error);
                    stats.skipped += 1;
                    continue;
                }
            };

            let loaded = Url::parse(&page.loaded_url).unwrap_or(url);
            frontier.mark_seen(&loaded);

            for link in discover_links(&page.html, &loaded) {
                if self.should_follow(&loaded, &link) && frontier.push(link.clone()) {
                    tracing::trace!("Queued {}", link);
                }
            }

            if tx.send(Ok(page)).await.is_err() {
                tracing::debug!("Pipeline closed, stopping fetch engine");
                tasks.abort_all();
                break;
            }
            stats.delivered += 1;
        }

        tracing::info!(
            "Fetch engine finished: {} requested, {} delivered, {} skipped, {} still queued",
            stats.requested,
            stats.delivered,
            stats.skipped,
            frontier.len()
        );

        stats
    }
}
