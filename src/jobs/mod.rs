//! Crawl job tracking
//!
//! This module tracks which projects currently have a crawl running and
//! classifies a project's crawl status from the registry and its stored
//! pages.

mod registry;
mod status;

pub use registry::{CrawlJob, CrawlJobRegistry, JobGuard};
pub use status::{resolve_status, CrawlStatus, StatusReport};
