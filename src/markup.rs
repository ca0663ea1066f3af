//! In-memory markup tree used as the truncation coordinate space.
//!
//! A fragment is an owned tree of [`MarkupNode`] values. Every offset used by
//! the slicer and the search driver is a count of `char`s in the fragment's
//! flattened text (pre-order concatenation of all text nodes).

use std::collections::BTreeMap;

/// Element attributes. Ordering is irrelevant to rendering; the map keeps
/// serialization deterministic.
pub type Attributes = BTreeMap<String, String>;

/// Tag name reserved for fragment roots. A fragment root serializes as its
/// children only.
pub const FRAGMENT_TAG: &str = "";

/// A node of a markup fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupNode {
    /// Text leaf.
    Text { content: String },
    /// Element owning its children exclusively.
    Element {
        tag_name: String,
        attributes: Attributes,
        children: Vec<MarkupNode>,
    },
}

impl MarkupNode {
    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create an element without attributes or children.
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self::Element {
            tag_name: tag_name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Create a fragment root holding `children`.
    pub fn fragment(children: impl IntoIterator<Item = MarkupNode>) -> Self {
        Self::Element {
            tag_name: String::from(FRAGMENT_TAG),
            attributes: Attributes::new(),
            children: children.into_iter().collect(),
        }
    }

    /// Builder: set an attribute. No-op on text nodes.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Builder: append a child. No-op on text nodes.
    pub fn with_child(mut self, child: MarkupNode) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Builder: append several children. No-op on text nodes.
    pub fn with_children(mut self, extra: impl IntoIterator<Item = MarkupNode>) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.extend(extra);
        }
        self
    }

    /// Whether this node is a fragment root.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Self::Element { tag_name, .. } if tag_name.is_empty())
    }

    /// Element tag name, `None` for text.
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Self::Element { tag_name, .. } => Some(tag_name.as_str()),
            Self::Text { .. } => None,
        }
    }

    /// Attribute value lookup, `None` for text nodes or missing attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            Self::Text { .. } => None,
        }
    }

    /// Child nodes; empty for text.
    pub fn children(&self) -> &[MarkupNode] {
        match self {
            Self::Element { children, .. } => children,
            Self::Text { .. } => &[],
        }
    }

    /// Mutable children, `None` for text nodes.
    pub fn children_mut(&mut self) -> Option<&mut Vec<MarkupNode>> {
        match self {
            Self::Element { children, .. } => Some(children),
            Self::Text { .. } => None,
        }
    }

    /// Whether the element carries hyperlink semantics.
    ///
    /// The truncation marker is never placed inside such an element.
    pub fn is_hyperlink(&self) -> bool {
        matches!(
            self,
            Self::Element { tag_name, .. }
                if tag_name.eq_ignore_ascii_case("a") || tag_name.eq_ignore_ascii_case("area")
        )
    }

    /// Copy of this node without children. Text nodes are cloned whole.
    pub fn empty_copy(&self) -> Self {
        match self {
            Self::Text { content } => Self::text(content.clone()),
            Self::Element {
                tag_name,
                attributes,
                ..
            } => Self::Element {
                tag_name: tag_name.clone(),
                attributes: attributes.clone(),
                children: Vec::new(),
            },
        }
    }

    /// Plain text length in `char`s.
    pub fn text_len(&self) -> usize {
        match self {
            Self::Text { content } => content.chars().count(),
            Self::Element { children, .. } => children.iter().map(Self::text_len).sum(),
        }
    }

    /// Flattened, tag-stripped text.
    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(64);
        self.append_plain_text(&mut out);
        out
    }

    /// Append flattened text to `out`.
    pub fn append_plain_text(&self, out: &mut String) {
        match self {
            Self::Text { content } => out.push_str(content),
            Self::Element { children, .. } => {
                for child in children {
                    child.append_plain_text(out);
                }
            }
        }
    }

    /// Total number of nodes including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Self::node_count).sum::<usize>()
    }

    /// Wrap a bare text node into a fragment root so children can be
    /// appended; elements are returned unchanged.
    pub fn into_container(self) -> Self {
        match self {
            text @ Self::Text { .. } => Self::fragment([text]),
            element => element,
        }
    }

    /// Return this fragment with `trailing` appended at root level.
    pub fn with_trailing(self, trailing: &[MarkupNode]) -> Self {
        if trailing.is_empty() {
            return self;
        }
        let mut root = self.into_container();
        if let Some(children) = root.children_mut() {
            children.extend(trailing.iter().cloned());
        }
        root
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Pre-order traversal returned by [`MarkupNode::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a MarkupNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a MarkupNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}
