//! Post extraction: timeline lookup, post discovery, identity and text.
//!
//! Every lookup is an ordered list of selectors tried in sequence; the first
//! selector with a non-empty result wins and results are never merged across
//! selectors.

use std::fmt;

use crate::config::SelectorsConfig;
use crate::dom::{parse_selector, parse_selectors, Document, NodeId, Selector, SelectorError};
use crate::util::strip_control_chars;

/// Attribute used to memoize a synthetic identity on a post node.
pub const SYNTHETIC_ID_ATTR: &str = "data-xfc-id";

/// Node-local attributes consulted for an identity, in order.
const IDENTITY_ATTRS: &[&str] = &[SYNTHETIC_ID_ATTR, "data-post-id", "data-tweet-id", "id"];

/// Identity of a post across re-scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostId {
    /// Numeric id from the post's `/status/<id>` permalink. Stable across re-renders.
    Status(String),
    /// Taken from an attribute on the post node.
    Attribute(String),
    /// Random token memoized on the node. Lost if the node is replaced.
    Synthetic(String),
}

impl PostId {
    pub fn as_str(&self) -> &str {
        match self {
            PostId::Status(id) | PostId::Attribute(id) | PostId::Synthetic(id) => id,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, PostId::Synthetic(_))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Status(id) => write!(f, "status:{id}"),
            PostId::Attribute(id) => write!(f, "attr:{id}"),
            PostId::Synthetic(id) => write!(f, "synthetic:{id}"),
        }
    }
}

/// Compiled selector lists for one page layout.
#[derive(Debug, Clone)]
pub struct Extractor {
    timeline: Vec<Selector>,
    posts: Vec<Selector>,
    post_text: Vec<Selector>,
    alternate_text: Vec<Selector>,
    time: Selector,
    link: Selector,
    section: Selector,
    article: Selector,
}

impl Extractor {
    /// Compile the configured selector lists.
    ///
    /// # Errors
    ///
    /// Returns the first [`SelectorError`] among the configured selectors.
    pub fn from_config(selectors: &SelectorsConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            timeline: parse_selectors(&selectors.timeline)?,
            posts: parse_selectors(&selectors.posts)?,
            post_text: parse_selectors(&selectors.post_text)?,
            alternate_text: parse_selectors(&selectors.alternate_text)?,
            time: parse_selector("time")?,
            link: parse_selector("a")?,
            section: parse_selector("section")?,
            article: parse_selector("article")?,
        })
    }

    /// Locate the container to watch for new posts.
    ///
    /// Tries the configured timeline selectors against the whole document, then
    /// the first `section` that contains an `article`. `None` when neither exists
    /// (yet).
    pub fn find_timeline(&self, doc: &Document) -> Option<NodeId> {
        let root = doc.root();
        for (index, selector) in self.timeline.iter().enumerate() {
            if let Some(found) = doc.query_selector(root, selector) {
                tracing::debug!(index, "Found timeline");
                return Some(found);
            }
        }

        doc.query_selector_all(root, &self.section)
            .into_iter()
            .find(|&section| doc.query_selector(section, &self.article).is_some())
    }

    /// Candidate post nodes under `root`, in document order.
    ///
    /// Falls back to containers that have a direct child with `role="article"`
    /// when no configured selector matches. Empty when nothing is found.
    pub fn find_posts(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        for (index, selector) in self.posts.iter().enumerate() {
            let posts = doc.query_selector_all(root, selector);
            if !posts.is_empty() {
                tracing::trace!(index, count = posts.len(), "Found posts");
                return posts;
            }
        }

        doc.descendants(root)
            .filter(|&node| {
                doc.is_element(node)
                    && doc
                        .children(node)
                        .into_iter()
                        .any(|child| doc.attr(child, "role") == Some("article"))
            })
            .collect()
    }

    /// Derive the identity of a post.
    ///
    /// Order: the `/status/<id>` permalink around the post's first `time`
    /// element, then a node-local attribute, then a random token. The token is
    /// written to the node as `data-xfc-id`, so the next scan of the same node
    /// finds it through the attribute path.
    pub fn identify(&self, doc: &mut Document, post: NodeId) -> PostId {
        if let Some(id) = self.status_id(doc, post) {
            return PostId::Status(id);
        }

        for attr in IDENTITY_ATTRS {
            if let Some(value) = doc.attr(post, attr).map(str::trim).filter(|v| !v.is_empty()) {
                return if *attr == SYNTHETIC_ID_ATTR {
                    PostId::Synthetic(value.to_string())
                } else {
                    PostId::Attribute(value.to_string())
                };
            }
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        doc.set_attr(post, SYNTHETIC_ID_ATTR, &token);
        tracing::debug!(token = %token, "No stable identity for post, using synthetic token");
        PostId::Synthetic(token)
    }

    fn status_id(&self, doc: &Document, post: NodeId) -> Option<String> {
        let time = doc.query_selector(post, &self.time)?;
        let link = doc.closest(time, &self.link)?;
        parse_status_id(doc.attr(link, "href")?).map(str::to_string)
    }

    /// Representative text of a post, with control characters removed.
    ///
    /// Uses the primary text node when present; otherwise the longest text among
    /// the first alternate selector that yields any non-empty text. Empty when
    /// nothing is found.
    pub fn extract_text(&self, doc: &Document, post: NodeId) -> String {
        for selector in &self.post_text {
            if let Some(node) = doc.query_selector(post, selector) {
                return strip_control_chars(&doc.text_content(node)).into_owned();
            }
        }

        for selector in &self.alternate_text {
            let longest = doc
                .query_selector_all(post, selector)
                .into_iter()
                .map(|node| doc.text_content(node))
                .fold(String::new(), |longest, text| {
                    if text.chars().count() > longest.chars().count() {
                        text
                    } else {
                        longest
                    }
                });
            if !longest.is_empty() {
                return strip_control_chars(&longest).into_owned();
            }
        }

        String::new()
    }
}

/// Numeric post id from a permalink (`/user/status/123`, absolute or relative).
fn parse_status_id(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next()?;
    let mut segments = path.split('/');
    segments.find(|segment| *segment == "status")?;
    let id = segments.next()?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}
