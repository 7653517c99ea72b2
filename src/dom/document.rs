use html5ever::tendril::StrTendril;
use html5ever::{ns, Attribute, LocalName, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector};

/// Handle to a node in a [`Document`]. Handles stay valid for the lifetime of
/// the document; detached nodes simply have no parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(ego_tree::NodeId);

/// A structural change to the tree, queued the way a MutationObserver queues
/// `childList` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The node whose children changed.
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// A parsed page plus the mutation records queued since the last drain.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    records: Vec<MutationRecord>,
}

impl Document {
    /// Parse a full HTML page. Parsing queues no records.
    pub fn parse_html(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            records: Vec::new(),
        }
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.html.html()
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(self.html.tree.root().id())
    }

    /// The `<body>` element, or the document root when there is none.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .find(|&id| self.tag_name(id) == Some("body"))
            .unwrap_or_else(|| self.root())
    }

    // ========================================================================
    // Node Creation and Tree Mutation
    // ========================================================================

    /// Create a detached HTML element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let name = QualName::new(None, ns!(html), LocalName::from(name.to_ascii_lowercase()));
        let element = Element::new(name, Vec::new());
        NodeId(self.html.tree.orphan(Node::Element(element)).id())
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let text = Text {
            text: scraper::StrTendril::from_slice(text),
        };
        NodeId(self.html.tree.orphan(Node::Text(text)).id())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(parent.0) {
            node.append_id(child.0);
            self.record_added(parent, child);
        }
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(parent.0) {
            node.prepend_id(child.0);
            self.record_added(parent, child);
        }
    }

    /// Remove a node from its parent. The node and its subtree stay addressable.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(mut handle) = self.html.tree.get_mut(node.0) {
            handle.detach();
        }
        self.records.push(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
    }

    /// Parse an HTML fragment and append its top-level nodes to `parent`,
    /// recording one mutation per appended node.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        // The fragment parser wraps the content in a synthetic <html> element.
        let fragment_root = self.html.tree.extend_tree(fragment.tree).id();
        let wrapper = self
            .html
            .tree
            .get(fragment_root)
            .and_then(|root| root.children().find(|child| child.value().is_element()))
            .map(|wrapper| NodeId(wrapper.id()));

        let added = wrapper.map(|w| self.children(w)).unwrap_or_default();
        for &node in &added {
            self.append_child(parent, node);
        }
        added
    }

    /// Replace all children of `node` with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        let old = self.children(node);
        for &child in &old {
            if let Some(mut handle) = self.html.tree.get_mut(child.0) {
                handle.detach();
            }
        }
        let text_node = self.create_text(text);
        if let Some(mut handle) = self.html.tree.get_mut(node.0) {
            handle.append_id(text_node.0);
        }
        self.records.push(MutationRecord {
            target: node,
            added: vec![text_node],
            removed: old,
        });
    }

    /// Drain the queued mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn record_added(&mut self, target: NodeId, child: NodeId) {
        self.records.push(MutationRecord {
            target,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.html.tree.get(node.0)?.parent().map(|p| NodeId(p.id()))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node.0)
            .map(|n| n.children().map(|c| NodeId(c.id())).collect())
            .unwrap_or_default()
    }

    /// `node` and everything below it, in document order.
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.html
            .tree
            .get(node.0)
            .into_iter()
            .flat_map(|n| n.descendants())
            .map(|n| NodeId(n.id()))
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root(), node)
    }

    // ========================================================================
    // Element Data
    // ========================================================================

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.html.tree.get(node.0)?.value().as_element()
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(Element::name)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.update_attrs(node, |attrs| {
            let value = StrTendril::from_slice(value);
            match attrs.iter_mut().find(|a| &*a.name.local == name) {
                Some(existing) => existing.value = value,
                None => attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(name)),
                    value,
                }),
            }
        });
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if self.attr(node, name).is_some() {
            self.update_attrs(node, |attrs| attrs.retain(|a| &*a.name.local != name));
        }
    }

    /// Rebuild an element with edited attributes. `Element` caches its id and
    /// class list on first use, so it is replaced rather than edited in place.
    fn update_attrs(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<Attribute>)) {
        let Some(mut handle) = self.html.tree.get_mut(node.0) else {
            return;
        };
        let Node::Element(element) = handle.value() else {
            return;
        };
        let mut attrs: Vec<Attribute> = element
            .attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: StrTendril::from_slice(value),
            })
            .collect();
        edit(&mut attrs);
        *element = Element::new(element.name.clone(), attrs);
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let value = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_owned(),
        };
        self.set_attr(node, "class", &value);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(existing) = self.attr(node, "class") else {
            return;
        };
        let remaining = existing
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        if remaining.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &remaining);
        }
    }

    /// Read one inline style property.
    pub fn style_property(&self, node: NodeId, property: &str) -> Option<String> {
        parse_style(self.attr(node, "style")?)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Set one inline style property; an empty value removes it.
    pub fn set_style_property(&mut self, node: NodeId, property: &str, value: &str) {
        let mut declarations = self.attr(node, "style").map(parse_style).unwrap_or_default();
        declarations.retain(|(k, _)| k != property);
        if !value.is_empty() {
            declarations.push((property.to_owned(), value.to_owned()));
        }
        if declarations.is_empty() {
            self.remove_attr(node, "style");
        } else {
            let style = declarations
                .iter()
                .map(|(k, v)| format!("{k}: {v};"))
                .collect::<Vec<_>>()
                .join(" ");
            self.set_attr(node, "style", &style);
        }
    }

    /// Concatenated text of all text nodes in the subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let Some(handle) = self.html.tree.get(node.0) else {
            return String::new();
        };
        handle
            .descendants()
            .filter_map(|n| n.value().as_text())
            .map(|t| &**t)
            .collect()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Elements strictly inside `scope` matching `selector`, in document order.
    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.select(scope, selector).collect()
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.select(scope, selector).next()
    }

    fn select<'a>(
        &'a self,
        scope: NodeId,
        selector: &'a Selector,
    ) -> Box<dyn Iterator<Item = NodeId> + 'a> {
        let Some(handle) = self.html.tree.get(scope.0) else {
            return Box::new(std::iter::empty());
        };
        match ElementRef::wrap(handle) {
            Some(element) => Box::new(element.select(selector).map(|e| NodeId(e.id()))),
            // The document node is not an element: search its element children
            // and their subtrees.
            None => Box::new(
                handle
                    .children()
                    .filter_map(ElementRef::wrap)
                    .flat_map(move |child| {
                        std::iter::once(child)
                            .filter(move |c| selector.matches(c))
                            .chain(child.select(selector))
                    })
                    .map(|e| NodeId(e.id())),
            ),
        }
    }

    /// Nearest inclusive ancestor of `node` matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let handle = self.html.tree.get(node.0)?;
        std::iter::once(handle)
            .chain(handle.ancestors())
            .filter_map(ElementRef::wrap)
            .find(|e| selector.matches(e))
            .map(|e| NodeId(e.id()))
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty()).then(|| (k.to_ascii_lowercase(), v.to_owned()))
        })
        .collect()
}
