//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl side of the system, including:
//! - HTTP fetching with bounded concurrency and a request cap
//! - The breadth-first frontier of URLs still to fetch
//! - The per-page extract and persist pipeline
//! - The crawl service that runs jobs in the background

mod fetcher;
mod frontier;
mod pipeline;
mod service;

pub use fetcher::{
    build_http_client, fetch_url, FetchItem, FetchResult, FetchStats, FetchedPage, HttpFetchEngine,
};
pub use frontier::Frontier;
pub use pipeline::{CrawlPipeline, CrawlSummary, PageOutcome};
pub use service::{CrawlAccepted, CrawlService, PageListing};
