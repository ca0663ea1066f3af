//! HTML-ish fragment parsing and serialization.
//!
//! Parsing is lenient in the ways real fragments need: void elements never
//! take children, unmatched end tags are ignored, and elements left open at
//! the end of input are closed. Comments, processing instructions and
//! doctypes are dropped.
//!
//! # Usage
//!
//! ```rust
//! use markup_truncate::markup_codec::{parse_fragment, to_markup_string};
//!
//! # fn example() -> Result<(), markup_truncate::MarkupError> {
//! let fragment = parse_fragment("<p>Hello <b>world</b></p>")?;
//! assert_eq!(fragment.plain_text(), "Hello world");
//! assert_eq!(to_markup_string(&fragment), "<p>Hello <b>world</b></p>");
//! # Ok(())
//! # }
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::MarkupError;
use crate::markup::{Attributes, MarkupNode};

/// Elements that never hold children.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Limits for fragment parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkupLimits {
    /// Maximum input size in bytes.
    pub max_input_bytes: usize,
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Maximum number of nodes in the parsed tree.
    pub max_nodes: usize,
}

impl Default for MarkupLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 1024 * 1024,
            max_depth: 256,
            max_nodes: 65_536,
        }
    }
}

/// Parse a markup fragment into a fragment root.
pub fn parse_fragment(markup: &str) -> Result<MarkupNode, MarkupError> {
    parse_fragment_with_limits(markup, MarkupLimits::default())
}

/// Parse a markup fragment with explicit limits.
pub fn parse_fragment_with_limits(
    markup: &str,
    limits: MarkupLimits,
) -> Result<MarkupNode, MarkupError> {
    if markup.len() > limits.max_input_bytes {
        return Err(MarkupError::new(
            "MARKUP_INPUT_TOO_LARGE",
            format!(
                "Fragment exceeds max_input_bytes ({} > {})",
                markup.len(),
                limits.max_input_bytes
            ),
        )
        .with_limit("max_input_bytes", markup.len(), limits.max_input_bytes));
    }

    let mut reader = Reader::from_reader(markup.as_bytes());
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut buf = Vec::with_capacity(64);
    // Open elements; index 0 is the fragment root and is never closed.
    let mut stack: Vec<MarkupNode> = vec![MarkupNode::fragment([])];
    let mut node_count = 1usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let element = element_from_start(&reader, &e)?;
                count_node(&mut node_count, &reader, limits)?;
                let is_void = element
                    .tag_name()
                    .is_some_and(|tag| VOID_TAGS.contains(&tag));
                if is_void {
                    append(&mut stack, element);
                } else {
                    if stack.len() > limits.max_depth {
                        return Err(MarkupError::new(
                            "MARKUP_DEPTH_LIMIT",
                            format!(
                                "Element nesting exceeds max_depth ({} > {})",
                                stack.len(),
                                limits.max_depth
                            ),
                        )
                        .with_limit("max_depth", stack.len(), limits.max_depth)
                        .with_token_offset(reader_token_offset(&reader)));
                    }
                    stack.push(element);
                }
            }
            Ok(Event::Empty(e)) => {
                let element = element_from_start(&reader, &e)?;
                count_node(&mut node_count, &reader, limits)?;
                append(&mut stack, element);
            }
            Ok(Event::End(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                let open_at = stack
                    .iter()
                    .skip(1)
                    .rposition(|node| node.tag_name() == Some(tag.as_str()));
                // Close the match along with everything opened inside it.
                if let Some(pos) = open_at {
                    close_until(&mut stack, pos + 1);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| {
                    MarkupError::new("MARKUP_DECODE_ERROR", format!("Decode error: {:?}", err))
                        .with_token_offset(reader_token_offset(&reader))
                })?;
                push_text(&mut stack, &text, &mut node_count, &reader, limits)?;
            }
            Ok(Event::CData(e)) => {
                let text = reader.decoder().decode(&e).map_err(|err| {
                    MarkupError::new("MARKUP_DECODE_ERROR", format!("Decode error: {:?}", err))
                        .with_token_offset(reader_token_offset(&reader))
                })?;
                push_text(&mut stack, &text, &mut node_count, &reader, limits)?;
            }
            Ok(Event::GeneralRef(e)) => {
                let name = e.decode().map_err(|err| {
                    MarkupError::new("MARKUP_DECODE_ERROR", format!("Decode error: {:?}", err))
                        .with_token_offset(reader_token_offset(&reader))
                })?;
                let resolved = resolve_entity(&name).unwrap_or_else(|| format!("&{};", name));
                push_text(&mut stack, &resolved, &mut node_count, &reader, limits)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(
                    MarkupError::new("MARKUP_XML_ERROR", format!("XML error: {:?}", err))
                        .with_token_offset(reader_token_offset(&reader)),
                );
            }
        }
        buf.clear();
    }

    close_until(&mut stack, 1);
    Ok(stack.pop().unwrap_or_else(|| MarkupNode::fragment([])))
}

/// Serialize a fragment back to markup.
pub fn to_markup_string(node: &MarkupNode) -> String {
    let mut out = String::with_capacity(128);
    write_markup(node, &mut out);
    out
}

/// Byte length of the serialized markup.
pub fn markup_len(node: &MarkupNode) -> usize {
    to_markup_string(node).len()
}

/// Append the serialized form of `node` to `out`.
pub fn write_markup(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text { content } => {
            out.push_str(&quick_xml::escape::partial_escape(content.as_str()));
        }
        MarkupNode::Element {
            tag_name,
            attributes,
            children,
        } => {
            if tag_name.is_empty() {
                for child in children {
                    write_markup(child, out);
                }
                return;
            }
            out.push('<');
            out.push_str(tag_name);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&quick_xml::escape::escape(value.as_str()));
                out.push('"');
            }
            if children.is_empty() && VOID_TAGS.contains(&tag_name.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in children {
                write_markup(child, out);
            }
            out.push_str("</");
            out.push_str(tag_name);
            out.push('>');
        }
    }
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, MarkupError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        MarkupError::new("MARKUP_DECODE_ERROR", format!("Decode error: {:?}", err))
            .with_token_offset(reader_token_offset(reader))
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
) -> Result<MarkupNode, MarkupError> {
    let tag_name = decode_tag_name(reader, e.name().as_ref())?;
    let mut attributes = Attributes::new();
    for attr in e.html_attributes().flatten() {
        let key = reader.decoder().decode(attr.key.as_ref()).map_err(|err| {
            MarkupError::new("MARKUP_DECODE_ERROR", format!("Decode error: {:?}", err))
                .with_token_offset(reader_token_offset(reader))
        })?;
        let value = reader
            .decoder()
            .decode(attr.value.as_ref())
            .unwrap_or_default();
        attributes.insert(key.into_owned(), unescape_entities(&value));
    }
    Ok(MarkupNode::Element {
        tag_name,
        attributes,
        children: Vec::new(),
    })
}

fn count_node(
    node_count: &mut usize,
    reader: &Reader<&[u8]>,
    limits: MarkupLimits,
) -> Result<(), MarkupError> {
    *node_count += 1;
    if *node_count > limits.max_nodes {
        return Err(MarkupError::new(
            "MARKUP_NODE_LIMIT",
            format!(
                "Fragment exceeds max_nodes ({} > {})",
                node_count, limits.max_nodes
            ),
        )
        .with_limit("max_nodes", *node_count, limits.max_nodes)
        .with_token_offset(reader_token_offset(reader)));
    }
    Ok(())
}

fn append(stack: &mut [MarkupNode], node: MarkupNode) {
    if let Some(children) = stack.last_mut().and_then(MarkupNode::children_mut) {
        children.push(node);
    }
}

/// Append text to the innermost open element, merging with a preceding text
/// node so entity references do not split runs.
fn push_text(
    stack: &mut [MarkupNode],
    text: &str,
    node_count: &mut usize,
    reader: &Reader<&[u8]>,
    limits: MarkupLimits,
) -> Result<(), MarkupError> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(children) = stack.last_mut().and_then(MarkupNode::children_mut) else {
        return Ok(());
    };
    if let Some(MarkupNode::Text { content }) = children.last_mut() {
        content.push_str(text);
        return Ok(());
    }
    count_node(node_count, reader, limits)?;
    children.push(MarkupNode::text(text));
    Ok(())
}

/// Pop open elements until `len` remain, attaching each to its parent.
fn close_until(stack: &mut Vec<MarkupNode>, len: usize) {
    while stack.len() > len.max(1) {
        if let Some(closed) = stack.pop() {
            append(stack, closed);
        }
    }
}

/// Resolve an entity reference name (without `&`/`;`).
pub fn resolve_entity(name: &str) -> Option<String> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        _ => return None,
    };
    Some(String::from(c))
}

/// Replace entity references inside an attribute value.
fn unescape_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) => match resolve_entity(&after[..semi]) {
                Some(resolved) => {
                    out.push_str(&resolved);
                    rest = &after[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
