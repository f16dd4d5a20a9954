//! Crawl status classification

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Coarse crawl state of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    /// No pages stored and nothing running
    Pending,
    /// A job is registered, or pages were written within the freshness window
    Running,
    /// Pages exist and the latest is older than the freshness window
    Completed,
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CrawlStatus::Pending => "pending",
            CrawlStatus::Running => "running",
            CrawlStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Status answer for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub project_id: i64,
    pub total_pages: u64,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub status: CrawlStatus,
    pub is_running: bool,
}

/// Classifies a project's crawl status
///
/// A registered job always means running. Otherwise recently written pages
/// are taken as a sign of a run still in flight elsewhere, so the latest
/// page counts as running while it is no older than `freshness`.
pub fn resolve_status(
    page_count: u64,
    last_crawled_at: Option<DateTime<Utc>>,
    is_running: bool,
    now: DateTime<Utc>,
    freshness: Duration,
) -> CrawlStatus {
    if is_running {
        return CrawlStatus::Running;
    }

    if page_count == 0 {
        return CrawlStatus::Pending;
    }

    match last_crawled_at {
        Some(last) if now - last <= freshness => CrawlStatus::Running,
        _ => CrawlStatus::Completed,
    }
}
