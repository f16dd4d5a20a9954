//! Content fingerprinting for change detection
//!
//! Re-crawls compare a page's fresh fingerprint with the stored
//! `content_hash` to tell whether the page actually changed.

mod hash;

pub use hash::{content_hash, normalize_markup};
