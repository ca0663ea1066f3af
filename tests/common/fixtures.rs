use markup_truncate::{HeightMeasurer, MarkupNode};

pub const FOX: &str = "The quick brown fox jumps over the lazy dog";

pub const ARTICLE: &str = concat!(
    "<p>Rust is a <em>multi-paradigm</em>, general-purpose programming language ",
    "that emphasizes <a href=\"/perf\">performance, type safety, and concurrency</a>.</p>",
    "<p>It enforces memory safety, meaning that all references point to valid memory, ",
    "without a <b>garbage collector</b>.</p>",
    "<ul><li>Ownership</li><li>Borrowing &amp; lifetimes</li><li>Traits</li></ul>",
);

pub const LINKED: &str =
    "<span>Read the <a href=\"/guide\">complete installation guide</a> before you start</span>";

/// Height in whole lines of `width` characters: `ceil(len / width) * line_height`.
pub fn ceil_lines(node: &MarkupNode, width: usize, line_height: f32) -> f32 {
    node.text_len().div_ceil(width) as f32 * line_height
}

/// Twenty characters per line, twenty units per line.
pub fn ceil20(node: &MarkupNode) -> f32 {
    ceil_lines(node, 20, 20.0)
}

/// Oracle wrapper that counts measurements.
pub struct CountingOracle<F> {
    inner: F,
    calls: usize,
}

impl<F> CountingOracle<F>
where
    F: FnMut(&MarkupNode) -> f32,
{
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl<F> HeightMeasurer for CountingOracle<F>
where
    F: FnMut(&MarkupNode) -> f32,
{
    fn measure_height(&mut self, candidate: &MarkupNode) -> f32 {
        self.calls += 1;
        (self.inner)(candidate)
    }
}

/// Every node reachable from `root` paired with its ancestor chain.
pub fn with_ancestors(root: &MarkupNode) -> Vec<(Vec<&MarkupNode>, &MarkupNode)> {
    let mut out = Vec::new();
    let mut stack = vec![(Vec::new(), root)];
    while let Some((ancestors, node)) = stack.pop() {
        for child in node.children().iter().rev() {
            let mut chain = ancestors.clone();
            chain.push(node);
            stack.push((chain, child));
        }
        out.push((ancestors, node));
    }
    out
}
