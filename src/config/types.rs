use serde::Deserialize;

/// Main configuration structure for SiteGraph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of HTTP requests in one crawl run
    #[serde(rename = "max-requests-per-crawl")]
    pub max_requests_per_crawl: u32,

    /// Maximum number of concurrent page fetches within one run
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: u32,

    /// Maximum number of crawl runs executing at once
    #[serde(rename = "max-concurrent-jobs")]
    pub max_concurrent_jobs: u32,

    /// Total timeout for one HTTP request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Hosts links may be followed to, e.g. "*.example.com"; when empty,
    /// links are followed on the page's own host only
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Seeds used when none are given on the command line
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_crawl: 100,
            max_concurrency: 10,
            max_concurrent_jobs: 4,
            request_timeout_secs: 60,
            connect_timeout_secs: 30,
            allowed_domains: Vec::new(),
            start_urls: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteGraph".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Status reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// How long after the latest page write a project still counts as running
    #[serde(rename = "freshness-window-secs")]
    pub freshness_window_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 300,
        }
    }
}

impl StatusConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        let secs = self.freshness_window_secs.min(i64::MAX as u64 / 1000);
        chrono::Duration::seconds(secs as i64)
    }
}
