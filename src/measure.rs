//! Height measurement boundary and a deterministic monospace reference.
//!
//! The engine never lays text out itself. It asks a [`TruncateHost`] for a
//! detached sandbox, measures candidates through [`HeightMeasurer`], and
//! drops the sandbox once a search completes.

use crate::markup::MarkupNode;

/// Candidate markup to rendered height, in the unit of the line height.
pub trait HeightMeasurer {
    fn measure_height(&mut self, candidate: &MarkupNode) -> f32;
}

impl<F> HeightMeasurer for F
where
    F: FnMut(&MarkupNode) -> f32,
{
    fn measure_height(&mut self, candidate: &MarkupNode) -> f32 {
        self(candidate)
    }
}

/// Parameters a host needs to build a measurement sandbox matching the
/// real element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SandboxRequest<'a> {
    /// Effective line height of the real element.
    pub line_height: f32,
    /// Alternate ancestor to clone instead of the element itself.
    pub context_scope: Option<&'a str>,
}

/// Everything a session needs from the environment hosting one element.
pub trait TruncateHost {
    type Sandbox: HeightMeasurer;

    /// Line height the host can infer from styling, if any.
    fn detected_line_height(&self) -> Option<f32>;

    /// Open a detached rendering context. Dropped after each search.
    fn open_sandbox(&mut self, request: &SandboxRequest<'_>) -> Self::Sandbox;

    /// Markup currently shown for the element, including any out-of-band
    /// edits made since the last render.
    fn observed_markup(&self) -> Option<MarkupNode>;

    /// Show `view` in place of the element's current content.
    fn render(&mut self, view: &MarkupNode);

    /// Set or clear the element's title-style tooltip.
    fn set_tooltip(&mut self, _tooltip: Option<&str>) {}
}

const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "li",
    "ul",
    "ol",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "pre",
    "section",
    "article",
    "table",
    "tr",
];

fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.iter().any(|block| block.eq_ignore_ascii_case(tag))
}

/// Greedy word-wrap measurer for fixed-width text.
///
/// Block elements start and end their own lines; `<br>` always ends the
/// current line, even an empty one. Words wider than a line are hard-split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonospaceMeasurer {
    pub columns: usize,
    pub line_height: f32,
}

impl MonospaceMeasurer {
    pub fn new(columns: usize, line_height: f32) -> Self {
        Self {
            columns: columns.max(1),
            line_height,
        }
    }

    /// Number of lines `node` wraps to.
    pub fn line_count(&self, node: &MarkupNode) -> usize {
        let mut wrap = Wrap {
            columns: self.columns,
            lines: 0,
            col: 0,
            open: false,
            pending: String::new(),
        };
        wrap.visit(node);
        wrap.finish()
    }
}

impl HeightMeasurer for MonospaceMeasurer {
    fn measure_height(&mut self, candidate: &MarkupNode) -> f32 {
        self.line_count(candidate) as f32 * self.line_height
    }
}

struct Wrap {
    columns: usize,
    lines: usize,
    col: usize,
    open: bool,
    // Inline text gathered until the next line break.
    pending: String,
}

impl Wrap {
    fn visit(&mut self, node: &MarkupNode) {
        match node {
            MarkupNode::Text { content } => self.pending.push_str(content),
            MarkupNode::Element {
                tag_name, children, ..
            } => {
                if tag_name.eq_ignore_ascii_case("br") {
                    self.flush();
                    self.lines += 1;
                    self.col = 0;
                    self.open = false;
                    return;
                }
                let block = is_block(tag_name);
                if block {
                    self.soft_break();
                }
                for child in children {
                    self.visit(child);
                }
                if block {
                    self.soft_break();
                }
            }
        }
    }

    fn soft_break(&mut self) {
        self.flush();
        if self.open {
            self.lines += 1;
            self.col = 0;
            self.open = false;
        }
    }

    fn flush(&mut self) {
        let pending = core::mem::take(&mut self.pending);
        for word in pending.split_whitespace() {
            self.place(word.chars().count());
        }
    }

    fn place(&mut self, width: usize) {
        if self.open && self.col + 1 + width <= self.columns {
            self.col += 1 + width;
            return;
        }
        if self.open {
            self.lines += 1;
        }
        self.lines += (width - 1) / self.columns;
        self.col = (width - 1) % self.columns + 1;
        self.open = true;
    }

    fn finish(mut self) -> usize {
        self.flush();
        self.lines + usize::from(self.open)
    }
}

/// In-memory host backed by [`MonospaceMeasurer`].
///
/// Keeps the last rendered view so callers can inspect it or simulate
/// out-of-band edits with [`MonospaceHost::edit_rendered`].
#[derive(Clone, Debug)]
pub struct MonospaceHost {
    columns: usize,
    line_height: Option<f32>,
    rendered: Option<MarkupNode>,
    tooltip: Option<String>,
    sandboxes_opened: usize,
}

impl MonospaceHost {
    /// Host wrapping text at `columns`; `line_height` is what the host
    /// reports as detected.
    pub fn new(columns: usize, line_height: Option<f32>) -> Self {
        Self {
            columns,
            line_height,
            rendered: None,
            tooltip: None,
            sandboxes_opened: 0,
        }
    }

    /// Last view rendered by a session.
    pub fn rendered(&self) -> Option<&MarkupNode> {
        self.rendered.as_ref()
    }

    /// Tooltip last set by a session.
    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    /// Replace the displayed markup without telling the session.
    pub fn edit_rendered(&mut self, markup: MarkupNode) {
        self.rendered = Some(markup);
    }

    /// Number of sandboxes handed out so far.
    pub fn sandboxes_opened(&self) -> usize {
        self.sandboxes_opened
    }
}

impl TruncateHost for MonospaceHost {
    type Sandbox = MonospaceMeasurer;

    fn detected_line_height(&self) -> Option<f32> {
        self.line_height
    }

    fn open_sandbox(&mut self, request: &SandboxRequest<'_>) -> Self::Sandbox {
        self.sandboxes_opened += 1;
        MonospaceMeasurer::new(self.columns, request.line_height)
    }

    fn observed_markup(&self) -> Option<MarkupNode> {
        self.rendered.clone()
    }

    fn render(&mut self, view: &MarkupNode) {
        self.rendered = Some(view.clone());
    }

    fn set_tooltip(&mut self, tooltip: Option<&str>) {
        self.tooltip = tooltip.map(String::from);
    }
}
