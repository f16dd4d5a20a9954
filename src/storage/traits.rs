//! Storage traits and error types
//!
//! This module defines the trait interface for the page and link stores and
//! associated error types.

use crate::extract::PageRecord;
use crate::storage::{LinkEdge, ProjectStats, ReplaceOutcome, StoredPage};
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Any of these on a page write means the page is skipped; the crawl run
/// itself carries on.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp in database: {0}")]
    InvalidTimestamp(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Idempotent page persistence keyed by (project, canonical URL)
pub trait PageStore {
    /// Inserts or fully replaces the page for `(project_id, normalize_url(record.url))`
    ///
    /// On conflict every column is overwritten except the row's own id.
    ///
    /// # Returns
    ///
    /// The page ID, whether the row was created or replaced
    fn upsert_page(&mut self, project_id: i64, record: &PageRecord) -> StorageResult<i64>;

    /// Looks up a page ID by canonical URL
    fn page_id_by_url(&self, project_id: i64, url: &str) -> StorageResult<Option<i64>>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<StoredPage>;

    /// Gets a page by URL (normalized before lookup)
    fn get_page_by_url(&self, project_id: i64, url: &str) -> StorageResult<Option<StoredPage>>;

    /// Lists a project's pages ordered by ID
    fn list_pages(&self, project_id: i64, limit: u32, offset: u32)
        -> StorageResult<Vec<StoredPage>>;

    /// Counts all pages of a project
    fn count_pages(&self, project_id: i64) -> StorageResult<u64>;

    /// Page count and most recent crawl time for a project
    fn project_stats(&self, project_id: i64) -> StorageResult<ProjectStats>;
}

/// Outgoing link edges of pages
pub trait LinkStore {
    /// Replaces all outgoing edges of `from_page` with `edges`
    ///
    /// Each edge is `(target_url, anchor)`. Targets are normalized and
    /// resolved to a known page of the same project when one exists. An
    /// empty anchor is stored as NULL. Duplicate-key inserts are skipped and
    /// counted rather than failing the replace.
    fn replace_edges(
        &mut self,
        project_id: i64,
        from_page: i64,
        edges: &[(String, String)],
    ) -> StorageResult<ReplaceOutcome>;

    /// Gets all outgoing edges of a page
    fn outgoing_edges(&self, from_page: i64) -> StorageResult<Vec<LinkEdge>>;

    /// Gets all edges resolved to a target page
    fn incoming_edges(&self, to_page: i64) -> StorageResult<Vec<LinkEdge>>;

    /// Counts all edges of a project
    fn count_edges(&self, project_id: i64) -> StorageResult<u64>;
}
