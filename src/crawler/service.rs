//! Crawl service: the operations a front-end calls
//!
//! `start` registers a job and hands the crawl to a background task on a
//! bounded pool. `get_status` and `list_pages` read back what the crawls
//! have stored.

use crate::config::Config;
use crate::crawler::fetcher::{FetchItem, HttpFetchEngine};
use crate::crawler::pipeline::{CrawlPipeline, CrawlSummary};
use crate::jobs::{resolve_status, CrawlJobRegistry, JobGuard, StatusReport};
use crate::storage::{lock_storage, open_storage, PageStore, SqliteStorage, StoredPage};
use crate::SiteGraphError;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Buffer between the fetch engine and the pipeline
const PAGE_CHANNEL_CAPACITY: usize = 32;

/// Acknowledgement returned by [`CrawlService::start`]
#[derive(Debug)]
pub struct CrawlAccepted {
    /// Always "accepted"
    pub status: &'static str,
    pub project_id: i64,
    pub urls: Vec<String>,
    /// Request cap this run was started with
    pub max_requests: u32,
    /// Completes when the crawl run ends
    pub handle: JoinHandle<Result<CrawlSummary, SiteGraphError>>,
}

impl CrawlAccepted {
    /// Waits for the crawl run to end
    pub async fn wait(self) -> Result<CrawlSummary, SiteGraphError> {
        let project_id = self.project_id;
        self.handle
            .await
            .map_err(|_| SiteGraphError::JobPanicked(project_id))?
    }
}

/// One page of a project's stored pages, with the project total
#[derive(Debug, Clone, Serialize)]
pub struct PageListing {
    pub items: Vec<StoredPage>,
    /// Pages stored for the project, regardless of `limit` and `offset`
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Front-end operations over one storage and one job registry
pub struct CrawlService {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    registry: Arc<CrawlJobRegistry>,
    engine: Arc<HttpFetchEngine>,
    job_slots: Arc<Semaphore>,
}

impl CrawlService {
    /// Creates a service over an already opened storage
    pub fn new(config: Config, storage: SqliteStorage) -> Result<Self, SiteGraphError> {
        let engine = HttpFetchEngine::new(&config.crawler, &config.user_agent)?;
        let job_slots = config.crawler.max_concurrent_jobs.max(1) as usize;

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            registry: Arc::new(CrawlJobRegistry::new()),
            engine: Arc::new(engine),
            job_slots: Arc::new(Semaphore::new(job_slots)),
        })
    }

    /// Opens the configured database and creates a service over it
    pub fn from_config(config: Config) -> Result<Self, SiteGraphError> {
        let storage = open_storage(Path::new(&config.storage.database_path))?;
        Self::new(config, storage)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Arc<CrawlJobRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    fn pipeline(&self) -> CrawlPipeline {
        CrawlPipeline::new(Arc::clone(&self.storage))
    }

    /// Starts a crawl of `urls` for a project in the background
    ///
    /// The job is visible to `get_status` as soon as this returns, even while
    /// it waits for a free job slot. Starting a project that is already
    /// crawling replaces its registry entry; both runs continue.
    pub fn start(
        &self,
        project_id: i64,
        urls: Vec<String>,
    ) -> Result<CrawlAccepted, SiteGraphError> {
        self.start_with(project_id, urls, None)
    }

    /// Like [`start`](Self::start), capping this run at `max_requests`
    ///
    /// `None` or zero uses `max-requests-per-crawl` from the config.
    pub fn start_with(
        &self,
        project_id: i64,
        urls: Vec<String>,
        max_requests: Option<u32>,
    ) -> Result<CrawlAccepted, SiteGraphError> {
        if urls.is_empty() {
            return Err(SiteGraphError::NoStartUrls(project_id));
        }

        let max_requests = max_requests
            .filter(|&n| n > 0)
            .unwrap_or(self.config.crawler.max_requests_per_crawl);

        let guard = self.registry.track(project_id, urls.clone());
        tracing::info!(
            "Accepted crawl job {} for project {} ({} start URLs, up to {} requests)",
            guard.job_id(),
            project_id,
            urls.len(),
            max_requests
        );

        let engine = Arc::clone(&self.engine);
        let pipeline = self.pipeline();
        let job_slots = Arc::clone(&self.job_slots);
        let seeds = urls.clone();

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so this only waits
            let _slot = job_slots.acquire_owned().await.ok();

            let (tx, rx) = mpsc::channel(PAGE_CHANNEL_CAPACITY);
            let (fetch_stats, result) = tokio::join!(
                engine.run_capped(&seeds, max_requests as usize, tx),
                run_tracked(guard, pipeline, rx)
            );

            tracing::debug!(
                "Project {} fetch stats: {} requested, {} delivered",
                project_id,
                fetch_stats.requested,
                fetch_stats.delivered
            );

            result
        });

        Ok(CrawlAccepted {
            status: "accepted",
            project_id,
            urls,
            max_requests,
            handle,
        })
    }

    /// Runs the pipeline for a project over a caller-provided page source
    ///
    /// The project is registered as running for the duration of the call and
    /// cleared however the run ends.
    pub async fn run_job(
        &self,
        project_id: i64,
        source: mpsc::Receiver<FetchItem>,
    ) -> Result<CrawlSummary, SiteGraphError> {
        let guard = self.registry.track(project_id, Vec::new());
        run_tracked(guard, self.pipeline(), source).await
    }

    /// Reports a project's crawl status
    ///
    /// Unknown projects are reported as pending.
    pub fn get_status(&self, project_id: i64) -> Result<StatusReport, SiteGraphError> {
        let stats = lock_storage(&self.storage)?.project_stats(project_id)?;
        let is_running = self.registry.is_running(project_id);

        let status = resolve_status(
            stats.total_pages,
            stats.last_crawled_at,
            is_running,
            Utc::now(),
            self.config.status.freshness_window(),
        );

        Ok(StatusReport {
            project_id,
            total_pages: stats.total_pages,
            last_crawled_at: stats.last_crawled_at,
            status,
            is_running,
        })
    }

    /// Lists a project's stored pages along with how many there are in total
    pub fn list_pages(
        &self,
        project_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<PageListing, SiteGraphError> {
        let storage = lock_storage(&self.storage)?;
        let items = storage.list_pages(project_id, limit, offset)?;
        let total = storage.count_pages(project_id)?;

        Ok(PageListing {
            items,
            total,
            limit,
            offset,
        })
    }
}

/// Runs the pipeline while `guard` keeps the job registered
async fn run_tracked(
    guard: JobGuard,
    pipeline: CrawlPipeline,
    source: mpsc::Receiver<FetchItem>,
) -> Result<CrawlSummary, SiteGraphError> {
    let project_id = guard.project_id();
    let job_id = guard.job_id();

    let result = pipeline.run(project_id, source).await;
    drop(guard);

    match &result {
        Ok(summary) => tracing::info!(
            "Crawl job {} for project {} finished: {} pages saved, {} skipped, {} edges",
            job_id,
            project_id,
            summary.pages_saved,
            summary.extraction_failures + summary.persistence_failures,
            summary.edges_written
        ),
        Err(e) => tracing::error!(
            "Crawl job {} for project {} failed: {}",
            job_id,
            project_id,
            e
        ),
    }

    result
}
