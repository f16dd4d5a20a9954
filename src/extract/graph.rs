//! Link graph builder
//!
//! Collapses the internal links of one page into a single edge per canonical
//! target, choosing the anchor text for each edge.

use crate::extract::types::InternalLink;
use crate::url::normalize_url;
use std::collections::HashMap;

/// Outgoing edges of one page, keyed by canonical target URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    /// (canonical target, anchor) in order of first occurrence
    edges: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl LinkGraph {
    /// Builds the edge set for a page's internal links
    ///
    /// The first anchor seen for a target wins, except that an empty first
    /// anchor gives way to the first later non-empty one.
    pub fn build(links: &[InternalLink]) -> Self {
        let mut graph = Self::default();
        for link in links {
            graph.add(&link.url, &link.anchor);
        }
        graph
    }

    fn add(&mut self, url: &str, anchor: &str) {
        let target = normalize_url(url);

        match self.index.get(&target) {
            Some(&position) => {
                let existing = &mut self.edges[position].1;
                if existing.is_empty() && !anchor.is_empty() {
                    *existing = anchor.to_string();
                }
            }
            None => {
                self.index.insert(target.clone(), self.edges.len());
                self.edges.push((target, anchor.to_string()));
            }
        }
    }

    /// Returns the chosen anchor for a target, if the target is linked
    pub fn anchor_for(&self, target: &str) -> Option<&str> {
        self.index
            .get(&normalize_url(target))
            .map(|&position| self.edges[position].1.as_str())
    }

    /// The (target, anchor) pairs of the graph
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Builds the link graph for a page's internal links
pub fn build_link_graph(links: &[InternalLink]) -> LinkGraph {
    LinkGraph::build(links)
}
