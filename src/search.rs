//! Bisection over plain-text offsets for the longest fitting prefix.
//!
//! Rendered height is assumed monotonic in the retained text, so the search
//! keeps a known-fitting offset `near` and a known-overflowing offset `far`
//! and narrows them with word-snapped midpoints. Every probe is a slice with
//! the marker and the show affordance attached, measured by the oracle.

use core::time::Duration;
use std::time::Instant;

use crate::markup::MarkupNode;
use crate::measure::HeightMeasurer;
use crate::options::ResolvedOptions;
use crate::slicer::{slice_with_limits, Slice};
use crate::word::{boundary_at_or_before, word_end_after};

/// Result of one truncation search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Committed truncation offset; the full text length when nothing was cut.
    pub offset: usize,
    /// Truncated fragment with the marker (no affordance), or the untouched
    /// input when it already fits.
    pub fragment: MarkupNode,
    /// Source text actually kept in `fragment`.
    pub retained_len: usize,
    /// Whether the input exceeded the tolerated height.
    pub truncated: bool,
    /// Bisection iterations that produced a probe.
    pub steps: usize,
    /// Oracle calls, the initial full measurement included.
    pub measurements: usize,
    /// Whether the step budget ran out before the interval converged.
    pub exhausted: bool,
    /// Height of the untruncated input.
    pub original_height: f32,
    pub elapsed: Duration,
}

/// Find the largest word-snapped offset whose probe fits the target height.
///
/// The untruncated fragment is measured first; at or under the tolerated
/// height the search is a no-op. Otherwise at most
/// `options.max_search_steps` oracle calls are made in total.
pub fn find_truncation_offset<M>(
    fragment: &MarkupNode,
    options: &ResolvedOptions,
    measurer: &mut M,
) -> SearchOutcome
where
    M: HeightMeasurer + ?Sized,
{
    let started = Instant::now();
    let chars: Vec<char> = fragment.plain_text().chars().collect();
    let total = chars.len();
    let target = options.target_height();
    let tolerated = options.tolerated_height();

    let original_height = measurer.measure_height(fragment);
    let mut measurements = 1usize;
    if original_height <= tolerated {
        log::debug!(
            "skipping truncation: height {} <= {} tolerated",
            original_height,
            tolerated
        );
        return SearchOutcome {
            offset: total,
            fragment: fragment.clone(),
            retained_len: total,
            truncated: false,
            steps: 0,
            measurements,
            exhausted: false,
            original_height,
            elapsed: started.elapsed(),
        };
    }

    let mut near = 0usize;
    let mut far = total;
    let mut mid = total;
    let mut height = original_height;
    let mut steps = 0usize;
    let mut exhausted = false;
    // Slice at `mid` and the last slice known to fit (at `near`).
    let mut probe: Option<Slice> = None;
    let mut fitting: Option<Slice> = None;

    loop {
        if height > target {
            far = mid;
        } else {
            near = mid;
            fitting = probe.take();
        }

        let avg = (far + near) / 2;
        let mut next = boundary_at_or_before(&chars, avg);
        if next <= near {
            if let Some(end) = word_end_after(&chars, avg, far) {
                next = end;
            }
        }
        if next <= near {
            break;
        }
        if measurements >= options.max_search_steps {
            exhausted = true;
            log::warn!(
                "truncation search stopped after {} measurements with near={} far={}",
                measurements,
                near,
                far
            );
            break;
        }

        mid = next;
        steps += 1;
        let candidate = slice_with_limits(fragment, mid, &options.marker, options.slice_limits);
        let view = candidate
            .fragment
            .clone()
            .with_trailing(&options.show_affordance);
        height = measurer.measure_height(&view);
        measurements += 1;
        log::trace!(
            "search step {}: offset {} in [{}, {}] measured {}",
            steps,
            mid,
            near,
            far,
            height
        );
        probe = Some(candidate);
    }

    let committed = match fitting {
        Some(slice) => slice,
        None => slice_with_limits(fragment, near, &options.marker, options.slice_limits),
    };
    let elapsed = started.elapsed();
    log::debug!(
        "truncated element with height {} > {} in {} steps ({:?})",
        original_height,
        tolerated,
        steps,
        elapsed
    );
    SearchOutcome {
        offset: near,
        fragment: committed.fragment,
        retained_len: committed.retained_len,
        truncated: true,
        steps,
        measurements,
        exhausted,
        original_height,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup_codec::parse_fragment;
    use crate::options::TruncateOptions;
    use crate::word::is_boundary;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    fn ceil_oracle(node: &MarkupNode) -> f32 {
        ((node.text_len() + 19) / 20 * 20) as f32
    }

    fn resolved(opts: TruncateOptions) -> ResolvedOptions {
        opts.with_line_height(20.0).resolve(None).expect("resolve")
    }

    #[test]
    fn fox_example_lands_after_fox() {
        let opts = resolved(TruncateOptions::default().with_marker("\u{2026}"));
        let fragment = MarkupNode::fragment([MarkupNode::text(FOX)]);
        let mut oracle = ceil_oracle;
        let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
        assert!(outcome.truncated);
        assert_eq!(outcome.offset, 20);
        assert_eq!(outcome.fragment.plain_text(), "The quick brown fox\u{2026}");
        assert_eq!(outcome.retained_len, 19);
        assert!(!outcome.exhausted);
        assert_eq!(outcome.original_height, 60.0);
    }

    #[test]
    fn fitting_input_is_returned_untouched() {
        let mut options = TruncateOptions::default().with_max_lines(2).with_marker("...");
        options.allowed_extra_lines = 1;
        let opts = resolved(options);
        let fragment = parse_fragment("<b>The quick brown fox</b> jumps over the lazy dog")
            .expect("parse");
        let mut calls = 0;
        let mut oracle = |node: &MarkupNode| {
            calls += 1;
            ceil_oracle(node)
        };
        let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
        assert!(!outcome.truncated);
        assert_eq!(outcome.fragment, fragment);
        assert_eq!(outcome.offset, fragment.text_len());
        assert_eq!(calls, 1);
    }

    #[test]
    fn measurements_never_exceed_step_budget() {
        let long = "word ".repeat(400);
        let fragment = MarkupNode::fragment([MarkupNode::text(long)]);
        for budget in [1u32, 2, 3, 5, 8, 100] {
            let mut options = TruncateOptions::default();
            options.max_search_steps = budget;
            let opts = resolved(options);
            let mut calls = 0usize;
            let mut oracle = |node: &MarkupNode| {
                calls += 1;
                ceil_oracle(node)
            };
            let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
            assert!(calls <= budget as usize, "budget {budget}: {calls} calls");
            assert_eq!(outcome.measurements, calls);
            assert!(outcome.fragment.text_len() <= 20);
        }
    }

    #[test]
    fn exhausted_search_commits_best_known_fit() {
        let mut options = TruncateOptions::default();
        options.max_search_steps = 3;
        let opts = resolved(options);
        let fragment = MarkupNode::fragment([MarkupNode::text("word ".repeat(400))]);
        let mut oracle = ceil_oracle;
        let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
        assert!(outcome.exhausted);
        assert!(ceil_oracle(&outcome.fragment) <= 20.0);
    }

    #[test]
    fn committed_offsets_sit_on_word_boundaries() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda";
        let chars: Vec<char> = text.chars().collect();
        let fragment = parse_fragment(&format!("<p><i>{}</i></p>", text)).expect("parse");
        for max_lines in 1..4 {
            let opts = resolved(TruncateOptions::default().with_max_lines(max_lines));
            let mut oracle = ceil_oracle;
            let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
            assert!(outcome.truncated);
            assert!(is_boundary(&chars, outcome.offset));
            assert!(outcome.retained_len <= outcome.offset);
            assert!(ceil_oracle(&outcome.fragment) <= opts.target_height());
        }
    }

    #[test]
    fn affordance_counts_against_the_budget() {
        let opts = resolved(
            TruncateOptions::default()
                .with_marker("\u{2026}")
                .with_labels("more", "less"),
        );
        let fragment = MarkupNode::fragment([MarkupNode::text(FOX)]);
        let mut oracle = ceil_oracle;
        let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
        let view = outcome
            .fragment
            .clone()
            .with_trailing(&opts.show_affordance);
        assert!(ceil_oracle(&view) <= 20.0);
        assert_eq!(outcome.fragment.plain_text(), "The quick\u{2026}");
    }

    #[test]
    fn single_unbreakable_word_truncates_to_marker() {
        let opts = resolved(TruncateOptions::default().with_marker("~"));
        let fragment = MarkupNode::fragment([MarkupNode::text("x".repeat(50))]);
        let mut oracle = ceil_oracle;
        let outcome = find_truncation_offset(&fragment, &opts, &mut oracle);
        assert_eq!(outcome.offset, 0);
        assert_eq!(outcome.fragment.plain_text(), "~");
    }
}
