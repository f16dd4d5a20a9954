//! SiteGraph: crawl-to-graph extraction and idempotent persistence
//!
//! This crate crawls a website, extracts structured page data, builds the
//! internal link graph with anchor text, and persists pages and edges
//! idempotently into SQLite. An in-memory registry tracks running crawl jobs
//! per project so callers can poll crawl status.

pub mod config;
pub mod content;
pub mod crawler;
pub mod extract;
pub mod jobs;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for SiteGraph operations
#[derive(Debug, Error)]
pub enum SiteGraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No start URLs given for project {0}")]
    NoStartUrls(i64),

    #[error("Crawl job for project {0} panicked")]
    JobPanicked(i64),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for SiteGraph operations
pub type Result<T> = std::result::Result<T, SiteGraphError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use content::content_hash;
pub use crawler::{CrawlAccepted, CrawlService, PageListing};
pub use jobs::{CrawlJobRegistry, CrawlStatus, StatusReport};
pub use url::{normalize_url, same_host};
