//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the page and link
//! store traits.

use crate::extract::PageRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LinkStore, PageStore, StorageError, StorageResult};
use crate::storage::{LinkEdge, ProjectStats, ReplaceOutcome, StoredPage};
use crate::url::normalize_url;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const PAGE_COLUMNS: &str = "id, project_id, url, title, content_hash, crawled_at,
     technical_data, semantic_data, internal_links";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Id of a page just written, falling back to its natural key when the
    /// write reported no row
    fn resolve_upserted_id(
        conn: &Connection,
        project_id: i64,
        url: &str,
        returned: Option<i64>,
    ) -> StorageResult<i64> {
        if let Some(id) = returned {
            return Ok(id);
        }

        Self::find_page_id(conn, project_id, url)?
            .ok_or_else(|| StorageError::PageNotFound(format!("{} (project {})", url, project_id)))
    }

    fn find_page_id(conn: &Connection, project_id: i64, url: &str) -> StorageResult<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM pages WHERE project_id = ?1 AND url = ?2",
                params![project_id, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

/// Timestamps are stored as RFC 3339 UTC with millisecond precision so that
/// text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestamp(format!("{}: {}", raw, e)))
}

/// Raw page columns, decoded outside the rusqlite row callback so JSON and
/// timestamp errors surface as storage errors
struct PageRow {
    id: i64,
    project_id: i64,
    url: String,
    title: String,
    content_hash: String,
    crawled_at: String,
    technical_data: String,
    semantic_data: String,
    internal_links: String,
}

impl PageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            content_hash: row.get(4)?,
            crawled_at: row.get(5)?,
            technical_data: row.get(6)?,
            semantic_data: row.get(7)?,
            internal_links: row.get(8)?,
        })
    }

    fn decode(self) -> StorageResult<StoredPage> {
        Ok(StoredPage {
            id: self.id,
            project_id: self.project_id,
            url: self.url,
            title: self.title,
            content_hash: self.content_hash,
            crawled_at: parse_timestamp(&self.crawled_at)?,
            technical_data: serde_json::from_str(&self.technical_data)?,
            semantic_data: serde_json::from_str(&self.semantic_data)?,
            internal_links: serde_json::from_str(&self.internal_links)?,
        })
    }
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<LinkEdge> {
    Ok(LinkEdge {
        project_id: row.get(0)?,
        from_page: row.get(1)?,
        to_page: row.get(2)?,
        to_url: row.get(3)?,
        anchor: row.get(4)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl PageStore for SqliteStorage {
    fn upsert_page(&mut self, project_id: i64, record: &PageRecord) -> StorageResult<i64> {
        let url = normalize_url(&record.url);
        let technical_data = serde_json::to_string(&record.technical_data)?;
        let semantic_data = serde_json::to_string(&record.semantic_data)?;
        let internal_links = serde_json::to_string(&record.internal_links)?;

        let returned: Option<i64> = self
            .conn
            .query_row(
                "INSERT INTO pages (project_id, url, title, content_hash, crawled_at,
                     technical_data, semantic_data, internal_links)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(project_id, url) DO UPDATE SET
                     title = excluded.title,
                     content_hash = excluded.content_hash,
                     crawled_at = excluded.crawled_at,
                     technical_data = excluded.technical_data,
                     semantic_data = excluded.semantic_data,
                     internal_links = excluded.internal_links
                 RETURNING id",
                params![
                    project_id,
                    url,
                    record.title,
                    record.content_hash,
                    format_timestamp(&record.crawled_at),
                    technical_data,
                    semantic_data,
                    internal_links
                ],
                |row| row.get(0),
            )
            .optional()?;

        Self::resolve_upserted_id(&self.conn, project_id, &url, returned)
    }

    fn page_id_by_url(&self, project_id: i64, url: &str) -> StorageResult<Option<i64>> {
        Self::find_page_id(&self.conn, project_id, &normalize_url(url))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<StoredPage> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                params![page_id],
                PageRow::from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))?;

        row.decode()
    }

    fn get_page_by_url(&self, project_id: i64, url: &str) -> StorageResult<Option<StoredPage>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE project_id = ?1 AND url = ?2",
                    PAGE_COLUMNS
                ),
                params![project_id, normalize_url(url)],
                PageRow::from_row,
            )
            .optional()?;

        row.map(PageRow::decode).transpose()
    }

    fn list_pages(
        &self,
        project_id: i64,
        limit: u32,
        offset: u32,
    ) -> StorageResult<Vec<StoredPage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE project_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
            PAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![project_id, limit, offset], PageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(PageRow::decode).collect()
    }

    fn count_pages(&self, project_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn project_stats(&self, project_id: i64) -> StorageResult<ProjectStats> {
        let (count, last): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(crawled_at) FROM pages WHERE project_id = ?1",
            params![project_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(ProjectStats {
            total_pages: count as u64,
            last_crawled_at: last.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

impl LinkStore for SqliteStorage {
    fn replace_edges(
        &mut self,
        project_id: i64,
        from_page: i64,
        edges: &[(String, String)],
    ) -> StorageResult<ReplaceOutcome> {
        let tx = self.conn.transaction()?;
        let mut outcome = ReplaceOutcome::default();

        // Resolve targets before touching the old edge set
        let mut resolved_edges = Vec::with_capacity(edges.len());
        for (target_url, anchor) in edges {
            let to_url = normalize_url(target_url);
            let to_page = Self::find_page_id(&tx, project_id, &to_url)?;
            let anchor = if anchor.is_empty() {
                None
            } else {
                Some(anchor.as_str())
            };
            resolved_edges.push((to_url, to_page, anchor));
        }

        outcome.removed = tx.execute(
            "DELETE FROM internal_links WHERE project_id = ?1 AND from_page = ?2",
            params![project_id, from_page],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO internal_links (project_id, from_page, to_page, to_url, anchor)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (to_url, to_page, anchor) in &resolved_edges {
                match insert.execute(params![project_id, from_page, to_page, to_url, anchor]) {
                    Ok(_) => {
                        outcome.inserted += 1;
                        if to_page.is_some() {
                            outcome.resolved += 1;
                        }
                    }
                    Err(e) if is_unique_violation(&e) => {
                        tracing::debug!(
                            "Ignoring duplicate edge {} -> {} in project {}",
                            from_page,
                            to_url,
                            project_id
                        );
                        outcome.conflicts_ignored += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn outgoing_edges(&self, from_page: i64) -> StorageResult<Vec<LinkEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, from_page, to_page, to_url, anchor
             FROM internal_links WHERE from_page = ?1 ORDER BY id ASC",
        )?;

        let edges = stmt
            .query_map(params![from_page], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    fn incoming_edges(&self, to_page: i64) -> StorageResult<Vec<LinkEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, from_page, to_page, to_url, anchor
             FROM internal_links WHERE to_page = ?1 ORDER BY id ASC",
        )?;

        let edges = stmt
            .query_map(params![to_page], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    fn count_edges(&self, project_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM internal_links WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TechnicalData;
    use chrono::Duration;

    fn record(url: &str, title: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            title: title.to_string(),
            content_hash: format!("hash-of-{}", title),
            crawled_at: Utc::now(),
            technical_data: TechnicalData::default(),
            semantic_data: serde_json::Map::new(),
            internal_links: vec![],
            internal_links_with_anchor: vec![],
        }
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(url, anchor)| (url.to_string(), anchor.to_string()))
            .collect()
    }

    #[test]
    fn test_upsert_returns_id() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage
            .upsert_page(1, &record("https://a.com/", "Home"))
            .unwrap();
        assert!(id > 0);
        assert_eq!(storage.page_id_by_url(1, "https://a.com/").unwrap(), Some(id));
    }

    #[test]
    fn test_upserted_id_falls_back_to_natural_key() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .conn
            .execute(
                "INSERT OR IGNORE INTO pages (project_id, url, title, content_hash, crawled_at,
                     technical_data, semantic_data, internal_links)
                 VALUES (1, 'https://a.com/', 'Home', 'h', '2024-01-01T00:00:00.000Z',
                     '{}', '{}', '[]')",
                [],
            )
            .unwrap();
        let stored = storage.page_id_by_url(1, "https://a.com/").unwrap().unwrap();

        let id = SqliteStorage::resolve_upserted_id(&storage.conn, 1, "https://a.com/", None)
            .unwrap();
        assert_eq!(id, stored);

        // A returned id wins without a lookup
        let id = SqliteStorage::resolve_upserted_id(&storage.conn, 1, "https://b.com/", Some(42))
            .unwrap();
        assert_eq!(id, 42);

        let missing = SqliteStorage::resolve_upserted_id(&storage.conn, 2, "https://a.com/", None);
        assert!(matches!(missing, Err(StorageError::PageNotFound(_))));
    }

    #[test]
    fn test_upsert_same_key_keeps_one_row_with_latest_values() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let first = storage
            .upsert_page(7, &record("https://a.com/x/", "Old title"))
            .unwrap();
        let second = storage
            .upsert_page(7, &record("https://a.com/x?utm=1#top", "New title"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.project_stats(7).unwrap().total_pages, 1);

        let page = storage.get_page(first).unwrap();
        assert_eq!(page.url, "https://a.com/x");
        assert_eq!(page.title, "New title");
        assert_eq!(page.content_hash, "hash-of-New title");
    }

    #[test]
    fn test_upsert_is_full_replace() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let mut rich = record("https://a.com/p", "Rich");
        rich.technical_data.word_count = 120;
        rich.technical_data
            .meta
            .insert("description".to_string(), "d".to_string());
        rich.internal_links = vec!["https://a.com/q".to_string()];
        let id = storage.upsert_page(1, &rich).unwrap();

        storage.upsert_page(1, &record("https://a.com/p", "Bare")).unwrap();

        let page = storage.get_page(id).unwrap();
        assert_eq!(page.technical_data, TechnicalData::default());
        assert!(page.internal_links.is_empty());
    }

    #[test]
    fn test_same_url_in_different_projects() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = storage.upsert_page(1, &record("https://a.com/", "A")).unwrap();
        let b = storage.upsert_page(2, &record("https://a.com/", "B")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_page_roundtrip_preserves_fields() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut page = record("https://a.com/doc", "Doc");
        page.technical_data.headings.push(crate::extract::Heading {
            level: 2,
            text: "Section".to_string(),
        });
        page.internal_links = vec!["https://a.com/a".to_string(), "https://a.com/b".to_string()];
        let id = storage.upsert_page(3, &page).unwrap();

        let stored = storage.get_page_by_url(3, "https://a.com/doc/").unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.technical_data, page.technical_data);
        assert_eq!(stored.internal_links, page.internal_links);
        assert_eq!(
            stored.crawled_at.timestamp_millis(),
            page.crawled_at.timestamp_millis()
        );
    }

    #[test]
    fn test_get_missing_page() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_page(42),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(storage.get_page_by_url(1, "https://a.com/").unwrap().is_none());
    }

    #[test]
    fn test_project_stats() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.project_stats(5).unwrap(), ProjectStats::default());

        let now = Utc::now();
        let mut older = record("https://a.com/1", "1");
        older.crawled_at = now - Duration::minutes(30);
        let mut newer = record("https://a.com/2", "2");
        newer.crawled_at = now - Duration::minutes(2);
        storage.upsert_page(5, &newer).unwrap();
        storage.upsert_page(5, &older).unwrap();

        let stats = storage.project_stats(5).unwrap();
        assert_eq!(stats.total_pages, 2);
        assert_eq!(
            stats.last_crawled_at.unwrap().timestamp_millis(),
            newer.crawled_at.timestamp_millis()
        );
    }

    #[test]
    fn test_list_pages_paginates() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for i in 0..5 {
            storage
                .upsert_page(1, &record(&format!("https://a.com/{}", i), &i.to_string()))
                .unwrap();
        }
        storage.upsert_page(2, &record("https://b.com/", "b")).unwrap();

        let page = storage.list_pages(1, 2, 1).unwrap();
        let titles: Vec<&str> = page.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["1", "2"]);
        assert_eq!(storage.list_pages(1, 100, 0).unwrap().len(), 5);
        assert_eq!(storage.count_pages(1).unwrap(), 5);
        assert_eq!(storage.count_pages(2).unwrap(), 1);
    }

    #[test]
    fn test_replace_edges_resolves_known_targets() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let home = storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();
        let about = storage
            .upsert_page(1, &record("https://a.com/about", "About"))
            .unwrap();

        let outcome = storage
            .replace_edges(
                1,
                home,
                &edges(&[("https://a.com/about/", "About us"), ("https://a.com/new", "")]),
            )
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.resolved, 1);

        let stored = storage.outgoing_edges(home).unwrap();
        assert_eq!(
            stored,
            vec![
                LinkEdge {
                    project_id: 1,
                    from_page: home,
                    to_page: Some(about),
                    to_url: "https://a.com/about".to_string(),
                    anchor: Some("About us".to_string()),
                },
                LinkEdge {
                    project_id: 1,
                    from_page: home,
                    to_page: None,
                    to_url: "https://a.com/new".to_string(),
                    anchor: None,
                },
            ]
        );
        assert_eq!(storage.incoming_edges(about).unwrap().len(), 1);
    }

    #[test]
    fn test_targets_not_resolved_across_projects() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_page(2, &record("https://a.com/t", "Other project")).unwrap();
        let from = storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();

        storage
            .replace_edges(1, from, &edges(&[("https://a.com/t", "T")]))
            .unwrap();
        assert_eq!(storage.outgoing_edges(from).unwrap()[0].to_page, None);
    }

    #[test]
    fn test_replace_edges_removes_stale_edges() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();

        storage
            .replace_edges(1, page, &edges(&[("https://a.com/a", "A"), ("https://a.com/b", "B")]))
            .unwrap();
        let outcome = storage
            .replace_edges(1, page, &edges(&[("https://a.com/c", "C")]))
            .unwrap();

        assert_eq!(outcome.removed, 2);
        let urls: Vec<String> = storage
            .outgoing_edges(page)
            .unwrap()
            .into_iter()
            .map(|e| e.to_url)
            .collect();
        assert_eq!(urls, vec!["https://a.com/c".to_string()]);
    }

    #[test]
    fn test_replace_with_empty_set_clears_edges() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();

        storage
            .replace_edges(1, page, &edges(&[("https://a.com/a", "A")]))
            .unwrap();
        storage.replace_edges(1, page, &[]).unwrap();

        assert!(storage.outgoing_edges(page).unwrap().is_empty());
        assert_eq!(storage.count_edges(1).unwrap(), 0);
    }

    #[test]
    fn test_replace_leaves_other_pages_untouched() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = storage.upsert_page(1, &record("https://a.com/a", "A")).unwrap();
        let b = storage.upsert_page(1, &record("https://a.com/b", "B")).unwrap();

        storage.replace_edges(1, a, &edges(&[("https://a.com/b", "to b")])).unwrap();
        storage.replace_edges(1, b, &edges(&[("https://a.com/a", "to a")])).unwrap();
        storage.replace_edges(1, a, &[]).unwrap();

        assert_eq!(storage.outgoing_edges(b).unwrap().len(), 1);
        assert_eq!(storage.count_edges(1).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();

        let outcome = storage
            .replace_edges(
                1,
                page,
                &edges(&[("https://a.com/t", "One"), ("https://a.com/t/", "Two")]),
            )
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.conflicts_ignored, 1);
        let stored = storage.outgoing_edges(page).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].anchor.as_deref(), Some("One"));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.upsert_page(1, &record("https://a.com/", "Home")).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.project_stats(1).unwrap().total_pages, 1);
    }
}
