//! Breadth-first crawl frontier
//!
//! URLs are deduplicated on their canonical form, so `/docs`, `/docs/` and
//! `/docs?ref=nav` are fetched once per run.

use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// FIFO queue of URLs still to fetch, with the set of every URL ever queued
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<Url>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a URL unless its canonical form was seen before
    ///
    /// # Returns
    ///
    /// `true` if the URL was queued
    pub fn push(&mut self, mut url: Url) -> bool {
        url.set_fragment(None);
        if !self.mark_seen(&url) {
            return false;
        }
        self.queue.push_back(url);
        true
    }

    /// Records a URL as seen without queueing it (e.g. a redirect target)
    ///
    /// # Returns
    ///
    /// `true` if the URL had not been seen before
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.seen.insert(normalize_url(url.as_str()))
    }

    pub fn pop(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }

    /// Number of URLs waiting to be fetched
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct canonical URLs seen so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
