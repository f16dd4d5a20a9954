//! Configuration module for SiteGraph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitegraph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitegraph.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_requests_per_crawl);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, StatusConfig, StorageConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
