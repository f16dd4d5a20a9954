//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the SiteGraph database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per canonical page URL within a project
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL,
    crawled_at TEXT NOT NULL,
    technical_data TEXT NOT NULL DEFAULT '{}',
    semantic_data TEXT NOT NULL DEFAULT '{}',
    internal_links TEXT NOT NULL DEFAULT '[]',
    UNIQUE(project_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_project_crawled ON pages(project_id, crawled_at);

-- Outgoing internal links of each page from its latest crawl
CREATE TABLE IF NOT EXISTS internal_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    from_page INTEGER NOT NULL REFERENCES pages(id),
    to_page INTEGER REFERENCES pages(id),
    to_url TEXT NOT NULL,
    anchor TEXT,
    UNIQUE(project_id, from_page, to_url)
);

CREATE INDEX IF NOT EXISTS idx_internal_links_from ON internal_links(project_id, from_page);
CREATE INDEX IF NOT EXISTS idx_internal_links_to ON internal_links(to_page);
"#;

/// Initializes the database schema
///
/// Safe to call on every open; existing tables are left untouched.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
