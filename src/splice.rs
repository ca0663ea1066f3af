//! Exact split and re-join of fragments at a plain-text offset.
//!
//! Unlike the slicer, splitting does not snap to words or attach a marker:
//! `head` holds exactly the first `offset` chars and `tail` the rest. Every
//! element the cut passes through is duplicated into both halves; `depth`
//! counts those elements so [`join`] can fuse them back together.

use crate::markup::MarkupNode;

/// Both halves of a fragment cut at a plain-text offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub head: MarkupNode,
    pub tail: MarkupNode,
    /// Number of elements below the root that the cut passed through.
    pub depth: usize,
}

/// Cut `fragment` into the first `offset` chars and the remainder.
pub fn split_at(fragment: &MarkupNode, offset: usize) -> Split {
    let root = fragment.clone().into_container();
    let mut head = root.empty_copy();
    let mut tail = root.empty_copy();
    let mut depth = 0usize;
    split_children(root.children(), offset, &mut head, &mut tail, &mut depth);
    Split { head, tail, depth }
}

fn split_children(
    children: &[MarkupNode],
    mut remaining: usize,
    head: &mut MarkupNode,
    tail: &mut MarkupNode,
    depth: &mut usize,
) {
    for child in children {
        let len = child.text_len();
        if remaining == 0 {
            push_child(tail, child.clone());
        } else if len <= remaining {
            push_child(head, child.clone());
            remaining -= len;
        } else {
            match child {
                MarkupNode::Text { content } => {
                    let chars: Vec<char> = content.chars().collect();
                    let (left, right) = chars.split_at(remaining);
                    push_child(head, MarkupNode::text(left.iter().collect::<String>()));
                    push_child(tail, MarkupNode::text(right.iter().collect::<String>()));
                }
                MarkupNode::Element { children, .. } => {
                    *depth += 1;
                    let mut inner_head = child.empty_copy();
                    let mut inner_tail = child.empty_copy();
                    split_children(children, remaining, &mut inner_head, &mut inner_tail, depth);
                    push_child(head, inner_head);
                    push_child(tail, inner_tail);
                }
            }
            remaining = 0;
        }
    }
}

fn push_child(parent: &mut MarkupNode, child: MarkupNode) {
    if let Some(children) = parent.children_mut() {
        children.push(child);
    }
}

/// Concatenate `tail` after `head`, fusing up to `depth` levels of elements
/// that meet at the seam with identical tag and attributes. Text nodes that
/// meet at the innermost fused level are concatenated.
pub fn join(head: MarkupNode, tail: MarkupNode, depth: usize) -> MarkupNode {
    let mut root = head.into_container();
    let tail = tail.into_container();
    if let (Some(dst), MarkupNode::Element { children, .. }) = (root.children_mut(), tail) {
        append_fused(dst, children, depth);
    }
    root
}

fn append_fused(dst: &mut Vec<MarkupNode>, src: Vec<MarkupNode>, depth: usize) {
    let mut rest = src.into_iter();
    let Some(first) = rest.next() else {
        return;
    };
    match first {
        MarkupNode::Text { content } => match dst.last_mut() {
            Some(MarkupNode::Text { content: left }) => left.push_str(&content),
            _ => dst.push(MarkupNode::Text { content }),
        },
        element => match dst.last_mut() {
            Some(last) if depth > 0 && same_shell(last, &element) => {
                if let (Some(left), MarkupNode::Element { children, .. }) =
                    (last.children_mut(), element)
                {
                    append_fused(left, children, depth - 1);
                }
            }
            _ => dst.push(element),
        },
    }
    dst.extend(rest);
}

fn same_shell(left: &MarkupNode, right: &MarkupNode) -> bool {
    match (left, right) {
        (
            MarkupNode::Element {
                tag_name: left_tag,
                attributes: left_attrs,
                ..
            },
            MarkupNode::Element {
                tag_name,
                attributes,
                ..
            },
        ) => left_tag == tag_name && left_attrs == attributes,
        _ => false,
    }
}
