//! Per-page persistence pipeline
//!
//! Every fetched page goes through the same four steps: extract the page
//! record, collapse its internal links into graph edges, upsert the page and
//! replace its outgoing edges.

use crate::crawler::fetcher::{FetchItem, FetchedPage};
use crate::extract::{build_link_graph, extract_page};
use crate::storage::{lock_storage, LinkStore, PageStore, ReplaceOutcome, SqliteStorage};
use crate::SiteGraphError;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What happened to one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub page_id: i64,
    pub edges: ReplaceOutcome,
}

/// Counters for one crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Pages received from the fetch engine
    pub pages_seen: usize,
    /// Pages upserted with their edges replaced
    pub pages_saved: usize,
    /// Pages skipped because they could not be extracted
    pub extraction_failures: usize,
    /// Pages skipped because a write failed
    pub persistence_failures: usize,
    /// Edges written across all saved pages
    pub edges_written: usize,
    /// Edge inserts skipped as duplicates
    pub conflicts_ignored: usize,
}

/// Extract, build and persist loop for one project
#[derive(Clone)]
pub struct CrawlPipeline {
    storage: Arc<Mutex<SqliteStorage>>,
}

impl CrawlPipeline {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self { storage }
    }

    /// Runs one fetched page through extraction and persistence
    ///
    /// The upsert and the edge replace happen under a single storage lock, so
    /// no other page's write can land between them.
    pub fn process_page(
        &self,
        project_id: i64,
        page: &FetchedPage,
    ) -> Result<PageOutcome, SiteGraphError> {
        let url = if page.loaded_url.is_empty() {
            &page.request_url
        } else {
            &page.loaded_url
        };

        let record = extract_page(url, &page.html)?;
        let graph = build_link_graph(&record.internal_links_with_anchor);

        let mut storage = lock_storage(&self.storage)?;
        let page_id = storage.upsert_page(project_id, &record)?;
        let edges = storage.replace_edges(project_id, page_id, graph.edges())?;

        Ok(PageOutcome { page_id, edges })
    }

    /// Consumes fetch items until the source closes
    ///
    /// A page that fails extraction or persistence is logged, counted and
    /// skipped. An error item from the source ends the run with that error.
    pub async fn run(
        &self,
        project_id: i64,
        mut source: mpsc::Receiver<FetchItem>,
    ) -> Result<CrawlSummary, SiteGraphError> {
        let mut summary = CrawlSummary::default();

        while let Some(item) = source.recv().await {
            let page = match item {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Crawl of project {} aborted: {}", project_id, e);
                    return Err(e);
                }
            };

            summary.pages_seen += 1;

            match self.process_page(project_id, &page) {
                Ok(outcome) => {
                    summary.pages_saved += 1;
                    summary.edges_written += outcome.edges.inserted;
                    summary.conflicts_ignored += outcome.edges.conflicts_ignored;
                    tracing::info!(
                        "Saved {} as page {} ({} links, {} removed)",
                        page.loaded_url,
                        outcome.page_id,
                        outcome.edges.inserted,
                        outcome.edges.removed
                    );
                }
                Err(SiteGraphError::Extraction(e)) => {
                    summary.extraction_failures += 1;
                    tracing::warn!("Skipping {}: {}", page.request_url, e);
                }
                Err(e) => {
                    summary.persistence_failures += 1;
                    tracing::error!("Failed to save {}: {}", page.request_url, e);
                }
            }
        }

        Ok(summary)
    }
}
