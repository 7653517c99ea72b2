//! In-memory page model.
//!
//! The page is a [`scraper::Html`] tree wrapped in a [`Document`] that queues
//! [`MutationRecord`]s for structural changes (`append_child`, `prepend_child`,
//! `remove`, `append_html`, `set_text_content`). The observation loop drains
//! them with [`Document::take_records`]. Attribute and style changes are not
//! recorded. Serialization goes through html5ever.

mod document;

pub use document::{Document, MutationRecord, NodeId};
pub use scraper::Selector;

use thiserror::Error;

/// A configured CSS selector that failed to parse.
#[derive(Debug, Error)]
#[error("Invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

pub fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_owned(),
        reason: e.to_string(),
    })
}

/// Parse a priority list, failing on the first invalid entry.
pub fn parse_selectors(selectors: &[String]) -> Result<Vec<Selector>, SelectorError> {
    selectors.iter().map(|s| parse_selector(s)).collect()
}
