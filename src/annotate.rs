//! Visible effects on the page: hiding posts and category indicators.

use crate::category::Category;
use crate::config::SelectorsConfig;
use crate::dom::{parse_selector, Document, NodeId, Selector, SelectorError};

/// Marker class added to hidden posts.
pub const HIDDEN_CLASS: &str = "xfc-hidden-post";

/// Class of the indicator badge element.
pub const INDICATOR_CLASS: &str = "xfc-topic-indicator";

const INDICATOR_STYLE: &[(&str, &str)] = &[
    ("font-size", "11px"),
    ("font-weight", "bold"),
    ("padding", "2px 6px"),
    ("border-radius", "10px"),
    ("display", "inline-block"),
    ("margin-left", "8px"),
    ("position", "relative"),
    ("top", "-1px"),
    ("color", "white"),
];

/// Applies and reverts the page mutations for one layout.
#[derive(Debug, Clone)]
pub struct Annotator {
    cell: Selector,
    author_name: Selector,
    indicator: Selector,
    first_div: Selector,
}

impl Annotator {
    pub fn from_config(selectors: &SelectorsConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            cell: parse_selector(&selectors.cell)?,
            author_name: parse_selector(&selectors.author_name)?,
            indicator: parse_selector(&format!("div.{INDICATOR_CLASS}"))?,
            first_div: parse_selector("div")?,
        })
    }

    /// Suppress display of the post and of its enclosing cell, if any.
    pub fn hide_post(&self, doc: &mut Document, post: NodeId) {
        doc.set_style_property(post, "display", "none");
        doc.add_class(post, HIDDEN_CLASS);
        if let Some(cell) = doc.closest(post, &self.cell) {
            doc.set_style_property(cell, "display", "none");
        }
    }

    /// Undo [`hide_post`](Self::hide_post). Harmless on a post that was never hidden.
    pub fn show_post(&self, doc: &mut Document, post: NodeId) {
        doc.set_style_property(post, "display", "");
        doc.remove_class(post, HIDDEN_CLASS);
        if let Some(cell) = doc.closest(post, &self.cell) {
            doc.set_style_property(cell, "display", "");
        }
    }

    pub fn is_hidden(&self, doc: &Document, post: NodeId) -> bool {
        doc.has_class(post, HIDDEN_CLASS)
    }

    /// Insert the category badge, replacing any existing one.
    ///
    /// Placed after the author name block when the post has one, otherwise at
    /// the start of the post's first `div`, otherwise at the start of the post.
    pub fn attach_indicator(&self, doc: &mut Document, post: NodeId, category: Category) -> NodeId {
        self.remove_indicator(doc, post);

        let badge = doc.create_element("div");
        doc.set_attr(badge, "class", INDICATOR_CLASS);
        for (property, value) in INDICATOR_STYLE {
            doc.set_style_property(badge, property, value);
        }
        doc.set_style_property(badge, "background-color", category.indicator_color());
        doc.set_text_content(badge, category.label());

        let author_block = doc
            .query_selector(post, &self.author_name)
            .and_then(|name| doc.parent(name));
        match author_block {
            Some(parent) => doc.append_child(parent, badge),
            None => {
                let target = doc.query_selector(post, &self.first_div).unwrap_or(post);
                doc.prepend_child(target, badge);
            }
        }
        badge
    }

    /// Remove every indicator inside the post.
    pub fn remove_indicator(&self, doc: &mut Document, post: NodeId) {
        for badge in doc.query_selector_all(post, &self.indicator) {
            doc.remove(badge);
        }
    }

    pub fn indicator(&self, doc: &Document, post: NodeId) -> Option<NodeId> {
        doc.query_selector(post, &self.indicator)
    }
}
