//! URL handling module for SiteGraph
//!
//! This module provides URL canonicalization, host extraction and comparison,
//! and wildcard matching for allowed-domain patterns.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, same_host};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::{canonicalize, normalize_url, parse_url};
