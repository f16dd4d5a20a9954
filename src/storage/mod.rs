//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Idempotent page upserts keyed by project and canonical URL
//! - Replacing a page's outgoing link edges after each crawl of it
//! - Per-project page statistics for status reporting

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{LinkStore, PageStore, StorageError, StorageResult};

use crate::extract::TechnicalData;
use crate::SiteGraphError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SiteGraphError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SiteGraphError> {
    Ok(SqliteStorage::new(path)?)
}

/// Locks shared storage, mapping a poisoned lock to a storage error
pub fn lock_storage(storage: &Mutex<SqliteStorage>) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Represents a page in the database
#[derive(Debug, Clone, Serialize)]
pub struct StoredPage {
    pub id: i64,
    pub project_id: i64,
    pub url: String,
    pub title: String,
    pub content_hash: String,
    pub crawled_at: DateTime<Utc>,
    pub technical_data: TechnicalData,
    pub semantic_data: serde_json::Map<String, serde_json::Value>,
    pub internal_links: Vec<String>,
}

/// Represents a directed link edge between pages of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEdge {
    pub project_id: i64,
    pub from_page: i64,
    /// None while the target page has not been crawled
    pub to_page: Option<i64>,
    /// Canonical target URL
    pub to_url: String,
    pub anchor: Option<String>,
}

/// Aggregate page information for one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub total_pages: u64,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

/// What a `replace_edges` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Edges from the previous crawl that were removed
    pub removed: usize,
    /// Edges written
    pub inserted: usize,
    /// Of the inserted edges, how many resolved to a known page
    pub resolved: usize,
    /// Inserts skipped because of a duplicate key
    pub conflicts_ignored: usize,
}
