//! Page extraction and link graph construction
//!
//! This module contains the per-page side of the pipeline:
//! - Extracting a structured page record from fetched HTML
//! - Pairing internal links with their anchor text
//! - Collapsing those links into one edge per canonical target
//! - Discovering followable links for the fetch engine

mod graph;
mod links;
mod page;
mod types;

pub use graph::{build_link_graph, LinkGraph};
pub use links::{discover_links, resolve_link};
pub use page::extract_page;
pub use types::{ExtractError, Heading, InternalLink, PageRecord, TechnicalData};
