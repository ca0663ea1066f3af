//! Structural slicing of a markup tree at a plain-text offset.
//!
//! The slicer walks the source tree depth-first with an explicit work stack
//! and rebuilds the longest prefix whose text fits the offset. Whole subtrees
//! are copied when they fit; an overflowing element is copied empty and its
//! children are visited with the copy as their destination. The overflowing
//! text node is cut at the last word boundary and the marker is attached
//! after the retained text, outside any hyperlink ancestor.

use crate::markup::MarkupNode;
use crate::word::{boundary_at_or_before, trim_trailing_whitespace};

/// Default cap on work-stack pops for a single slice.
pub const DEFAULT_MAX_VISITS: usize = 1024;

/// Limits for slicing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceLimits {
    /// Maximum number of work-stack pops before the slicer gives up and
    /// returns the prefix built so far.
    pub max_visits: usize,
}

impl Default for SliceLimits {
    fn default() -> Self {
        Self {
            max_visits: DEFAULT_MAX_VISITS,
        }
    }
}

/// Result of a slice with bookkeeping for callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    /// The rebuilt prefix tree, marker included.
    pub fragment: MarkupNode,
    /// Plain-text length of the retained source text (marker excluded).
    pub retained_len: usize,
    /// Whether source text was dropped and the marker attached.
    pub truncated: bool,
    /// Whether the visit cap stopped the traversal early.
    pub capped: bool,
}

/// Slice `fragment` at `offset` with default limits.
///
/// Never mutates the input; the returned tree holds at most `offset` chars of
/// source text, followed by `marker` when anything was dropped.
pub fn slice(fragment: &MarkupNode, offset: usize, marker: &[MarkupNode]) -> MarkupNode {
    slice_with_limits(fragment, offset, marker, SliceLimits::default()).fragment
}

/// Slice `fragment` at `offset` with explicit limits.
pub fn slice_with_limits(
    fragment: &MarkupNode,
    offset: usize,
    marker: &[MarkupNode],
    limits: SliceLimits,
) -> Slice {
    if let MarkupNode::Text { .. } = fragment {
        let wrapped = MarkupNode::fragment([fragment.clone()]);
        return slice_with_limits(&wrapped, offset, marker, limits);
    }

    // A word may continue across node edges, so snap against the flattened
    // text before walking. Only the chars up to the cut are needed.
    let mut window = Vec::with_capacity(offset.saturating_add(1).min(4096));
    collect_prefix(fragment, offset.saturating_add(1), &mut window);
    let offset = boundary_at_or_before(&window, offset);

    let mut arena = Arena::new(fragment.empty_copy());
    let mut stack: Vec<(usize, &MarkupNode)> = Vec::with_capacity(16);
    for child in fragment.children().iter().rev() {
        stack.push((ROOT, child));
    }

    let mut consumed = 0usize;
    let mut visits = 0usize;
    let mut capped = false;
    // Destination that received the most recent retained text.
    let mut marker_anchor = ROOT;
    // Node that received the most recent retained text.
    let mut last_text: Option<usize> = None;

    while consumed < offset {
        let Some((parent, node)) = stack.pop() else {
            break;
        };
        if visits >= limits.max_visits {
            log::warn!(
                "slice visit cap reached ({}); keeping {} of {} chars",
                limits.max_visits,
                consumed,
                offset
            );
            capped = true;
            break;
        }
        visits += 1;

        let remaining = offset - consumed;
        match node {
            MarkupNode::Text { content } => {
                let len = content.chars().count();
                if len <= remaining {
                    let idx = arena.push(parent, node.clone());
                    consumed += len;
                    if len > 0 {
                        marker_anchor = parent;
                        last_text = Some(idx);
                    }
                    continue;
                }
                let chars: Vec<char> = content.chars().collect();
                let keep = boundary_at_or_before(&chars, remaining);
                if keep > 0 {
                    let kept: String = chars[..keep].iter().collect();
                    last_text = Some(arena.push(parent, MarkupNode::text(kept)));
                    consumed += keep;
                    marker_anchor = parent;
                }
                break;
            }
            MarkupNode::Element { children, .. } => {
                let len = node.text_len();
                if len <= remaining {
                    let idx = arena.push(parent, node.clone());
                    consumed += len;
                    if len > 0 {
                        marker_anchor = parent;
                        last_text = Some(idx);
                    }
                } else {
                    let shell = arena.push_shell(parent, node.empty_copy());
                    for child in children.iter().rev() {
                        stack.push((shell, child));
                    }
                }
            }
        }
    }

    let truncated = consumed < fragment.text_len();
    if truncated {
        if let Some(idx) = last_text {
            consumed -= arena.trim_end(idx);
        }
    }
    if truncated && !marker.is_empty() {
        let target = arena.outside_hyperlinks(marker_anchor);
        for node in marker {
            arena.push(target, node.clone());
        }
    }

    Slice {
        fragment: arena.into_tree(),
        retained_len: consumed,
        truncated,
        capped,
    }
}

const ROOT: usize = 0;

/// Push the first `limit` chars of the flattened text of `node` into `out`.
fn collect_prefix(node: &MarkupNode, limit: usize, out: &mut Vec<char>) {
    match node {
        MarkupNode::Text { content } => {
            let room = limit.saturating_sub(out.len());
            out.extend(content.chars().take(room));
        }
        MarkupNode::Element { children, .. } => {
            for child in children {
                if out.len() >= limit {
                    return;
                }
                collect_prefix(child, limit, out);
            }
        }
    }
}

/// Drop trailing whitespace from the last text inside `node`, walking back
/// over texts emptied on the way. Stops at a textless element such as `br`.
/// Returns the number of chars removed.
fn trim_node_end(node: &mut MarkupNode) -> usize {
    match node {
        MarkupNode::Text { content } => {
            let chars: Vec<char> = content.chars().collect();
            let keep = trim_trailing_whitespace(&chars, chars.len());
            if keep < chars.len() {
                *content = chars[..keep].iter().collect();
            }
            chars.len() - keep
        }
        MarkupNode::Element { children, .. } => {
            let mut removed = 0;
            let mut cursor = children.len();
            while cursor > 0 {
                cursor -= 1;
                let child = &mut children[cursor];
                if child.text_len() == 0 {
                    if matches!(child, MarkupNode::Text { .. }) {
                        continue;
                    }
                    break;
                }
                removed += trim_node_end(child);
                if child.text_len() > 0 {
                    break;
                }
            }
            if removed > 0 {
                children.retain(|child| {
                    !matches!(child, MarkupNode::Text { content } if content.is_empty())
                });
            }
            removed
        }
    }
}

struct ArenaNode {
    node: MarkupNode,
    parent: Option<usize>,
    children: Vec<usize>,
    // Empty copy of an overflowing element; dropped if nothing lands in it.
    shell: bool,
}

/// Output tree under construction. Nodes are addressed by index so the work
/// stack can name destinations without borrowing into the tree.
struct Arena {
    nodes: Vec<ArenaNode>,
}

impl Arena {
    fn new(root: MarkupNode) -> Self {
        let mut nodes = Vec::with_capacity(32);
        nodes.push(ArenaNode {
            node: root,
            parent: None,
            children: Vec::new(),
            shell: false,
        });
        Self { nodes }
    }

    fn push(&mut self, parent: usize, node: MarkupNode) -> usize {
        self.attach(parent, node, false)
    }

    fn push_shell(&mut self, parent: usize, node: MarkupNode) -> usize {
        self.attach(parent, node, true)
    }

    fn attach(&mut self, parent: usize, node: MarkupNode, shell: bool) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(ArenaNode {
            node,
            parent: Some(parent),
            children: Vec::new(),
            shell,
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    /// Drop trailing whitespace from the retained text at `idx`, returning
    /// the number of chars removed. A node left without text is detached.
    fn trim_end(&mut self, idx: usize) -> usize {
        let entry = &mut self.nodes[idx];
        let removed = trim_node_end(&mut entry.node);
        let detach = match &entry.node {
            MarkupNode::Text { content } => content.is_empty(),
            MarkupNode::Element { children, .. } => children.is_empty(),
        };
        if removed > 0 && detach {
            if let Some(parent) = entry.parent {
                self.nodes[parent].children.retain(|&child| child != idx);
            }
        }
        removed
    }

    /// Parent of the outermost hyperlink on the path from `idx` to the root,
    /// or `idx` itself when no hyperlink encloses it.
    fn outside_hyperlinks(&self, idx: usize) -> usize {
        let mut target = idx;
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            let entry = &self.nodes[current];
            if entry.node.is_hyperlink() {
                if let Some(parent) = entry.parent {
                    target = parent;
                }
            }
            cursor = entry.parent;
        }
        target
    }

    fn into_tree(self) -> MarkupNode {
        // Children always carry larger indices than their parent, so folding
        // from the back attaches every subtree before its parent is visited.
        let mut built: Vec<Option<MarkupNode>> = (0..self.nodes.len()).map(|_| None).collect();
        for (idx, entry) in self.nodes.into_iter().enumerate().rev() {
            let mut node = entry.node;
            if let Some(children) = node.children_mut() {
                for child in entry.children {
                    if let Some(built_child) = built[child].take() {
                        children.push(built_child);
                    }
                }
            }
            if entry.shell && node.children().is_empty() {
                continue;
            }
            built[idx] = Some(node);
        }
        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| MarkupNode::fragment([]))
    }
}
