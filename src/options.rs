//! Truncation options, partial updates, and their validated form.

use serde::{Deserialize, Serialize};

use crate::error::TruncateError;
use crate::markup::MarkupNode;
use crate::markup_codec::parse_fragment;
use crate::slicer::{SliceLimits, DEFAULT_MAX_VISITS};

/// Class carried by the "show full text" affordance link.
pub const SHOW_AFFORDANCE_CLASS: &str = "show";
/// Class carried by the "hide full text" affordance link.
pub const HIDE_AFFORDANCE_CLASS: &str = "hide";

/// How `update()` decides whether the host's rendered markup changed behind
/// the session's back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDetection {
    /// Compare serialized markup length only. Misses edits that keep the
    /// length unchanged.
    #[default]
    Length,
    /// Compare a hash of the serialized markup.
    ContentHash,
}

/// Caller-facing truncation options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TruncateOptions {
    /// Lines shown before truncation triggers.
    pub max_lines: u32,
    /// Height of one line. `None` defers to the host's detected value.
    pub line_height: Option<f32>,
    /// Slack lines tolerated before truncation triggers.
    pub allowed_extra_lines: u32,
    /// Markup inserted at the cut point.
    #[serde(alias = "truncateString")]
    pub truncate_marker: String,
    /// Label of the affordance that expands a collapsed view; empty disables it.
    #[serde(alias = "showText")]
    pub show_label: String,
    /// Label of the affordance that collapses an expanded view; empty disables it.
    #[serde(alias = "hideText")]
    pub hide_label: String,
    /// Whether a truncated element starts collapsed.
    #[serde(alias = "collapsed")]
    pub collapsed_initially: bool,
    /// Bisection step cap.
    pub max_search_steps: u32,
    /// Mirror the full plain text into a `title` attribute while collapsed.
    pub tooltip_from_plain_text: bool,
    /// Alternate ancestor the host should clone for measurement.
    #[serde(alias = "contextParent")]
    pub context_scope: Option<String>,
    /// Out-of-band edit detection strategy for `update()`.
    pub change_detection: ChangeDetection,
    /// Work-stack pop cap for a single slice.
    pub max_slice_visits: u32,
}

impl Default for TruncateOptions {
    fn default() -> Self {
        Self {
            max_lines: 1,
            line_height: None,
            allowed_extra_lines: 0,
            truncate_marker: String::new(),
            show_label: String::new(),
            hide_label: String::new(),
            collapsed_initially: true,
            max_search_steps: 100,
            tooltip_from_plain_text: false,
            context_scope: None,
            change_detection: ChangeDetection::Length,
            max_slice_visits: DEFAULT_MAX_VISITS as u32,
        }
    }
}

impl TruncateOptions {
    /// Load options from a JSON object. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, TruncateError> {
        serde_json::from_str(json).map_err(|err| TruncateError::invalid("options", err.to_string()))
    }

    /// Builder: set the line count.
    pub fn with_max_lines(mut self, max_lines: u32) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Builder: set an explicit line height.
    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = Some(line_height);
        self
    }

    /// Builder: set the truncation marker markup.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.truncate_marker = marker.into();
        self
    }

    /// Builder: set the show/hide affordance labels.
    pub fn with_labels(mut self, show: impl Into<String>, hide: impl Into<String>) -> Self {
        self.show_label = show.into();
        self.hide_label = hide.into();
        self
    }

    /// Validate and pre-build marker and affordance nodes.
    ///
    /// `detected_line_height` is used when no explicit line height is set;
    /// if neither is available this fails with
    /// [`TruncateError::MissingLineHeight`].
    pub fn resolve(&self, detected_line_height: Option<f32>) -> Result<ResolvedOptions, TruncateError> {
        let line_height = self
            .line_height
            .or(detected_line_height)
            .ok_or(TruncateError::MissingLineHeight)?;
        if !line_height.is_finite() || line_height <= 0.0 {
            return Err(TruncateError::invalid(
                "lineHeight",
                format!("must be a positive number, got {}", line_height),
            ));
        }
        if self.max_lines == 0 {
            return Err(TruncateError::invalid("maxLines", "must be greater than zero"));
        }
        if self.max_search_steps == 0 {
            return Err(TruncateError::invalid(
                "maxSearchSteps",
                "must be greater than zero",
            ));
        }
        if self.max_slice_visits == 0 {
            return Err(TruncateError::invalid(
                "maxSliceVisits",
                "must be greater than zero",
            ));
        }

        let marker = parse_fragment(&self.truncate_marker)?
            .children()
            .to_vec();
        Ok(ResolvedOptions {
            max_lines: self.max_lines,
            line_height,
            allowed_extra_lines: self.allowed_extra_lines,
            max_search_steps: self.max_search_steps as usize,
            slice_limits: SliceLimits {
                max_visits: self.max_slice_visits as usize,
            },
            marker,
            show_affordance: affordance_nodes(&self.show_label, SHOW_AFFORDANCE_CLASS)?,
            hide_affordance: affordance_nodes(&self.hide_label, HIDE_AFFORDANCE_CLASS)?,
            collapsed_initially: self.collapsed_initially,
            tooltip_from_plain_text: self.tooltip_from_plain_text,
            change_detection: self.change_detection,
            context_scope: self.context_scope.clone(),
        })
    }
}

/// Partial options; `None` fields leave the current value untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionsPatch {
    pub max_lines: Option<u32>,
    pub line_height: Option<f32>,
    pub allowed_extra_lines: Option<u32>,
    #[serde(alias = "truncateString")]
    pub truncate_marker: Option<String>,
    #[serde(alias = "showText")]
    pub show_label: Option<String>,
    #[serde(alias = "hideText")]
    pub hide_label: Option<String>,
    #[serde(alias = "collapsed")]
    pub collapsed_initially: Option<bool>,
    pub max_search_steps: Option<u32>,
    pub tooltip_from_plain_text: Option<bool>,
    #[serde(alias = "contextParent")]
    pub context_scope: Option<String>,
    pub change_detection: Option<ChangeDetection>,
    pub max_slice_visits: Option<u32>,
}

impl OptionsPatch {
    /// Merge this patch onto `options`.
    pub fn apply(&self, options: &mut TruncateOptions) {
        if let Some(v) = self.max_lines {
            options.max_lines = v;
        }
        if let Some(v) = self.line_height {
            options.line_height = Some(v);
        }
        if let Some(v) = self.allowed_extra_lines {
            options.allowed_extra_lines = v;
        }
        if let Some(v) = &self.truncate_marker {
            options.truncate_marker = v.clone();
        }
        if let Some(v) = &self.show_label {
            options.show_label = v.clone();
        }
        if let Some(v) = &self.hide_label {
            options.hide_label = v.clone();
        }
        if let Some(v) = self.collapsed_initially {
            options.collapsed_initially = v;
        }
        if let Some(v) = self.max_search_steps {
            options.max_search_steps = v;
        }
        if let Some(v) = self.tooltip_from_plain_text {
            options.tooltip_from_plain_text = v;
        }
        if let Some(v) = &self.context_scope {
            options.context_scope = Some(v.clone());
        }
        if let Some(v) = self.change_detection {
            options.change_detection = v;
        }
        if let Some(v) = self.max_slice_visits {
            options.max_slice_visits = v;
        }
    }
}

/// Validated options with marker and affordance nodes pre-built.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedOptions {
    pub max_lines: u32,
    pub line_height: f32,
    pub allowed_extra_lines: u32,
    pub max_search_steps: usize,
    pub slice_limits: SliceLimits,
    /// Nodes appended at the cut point.
    pub marker: Vec<MarkupNode>,
    /// Nodes appended to a collapsed view; empty when no show label is set.
    pub show_affordance: Vec<MarkupNode>,
    /// Nodes appended to an expanded view; empty when no hide label is set.
    pub hide_affordance: Vec<MarkupNode>,
    pub collapsed_initially: bool,
    pub tooltip_from_plain_text: bool,
    pub change_detection: ChangeDetection,
    pub context_scope: Option<String>,
}

impl ResolvedOptions {
    /// Height budget a truncated view must fit.
    pub fn target_height(&self) -> f32 {
        self.max_lines as f32 * self.line_height
    }

    /// Height above which truncation triggers.
    pub fn tolerated_height(&self) -> f32 {
        self.target_height() + self.allowed_extra_lines as f32 * self.line_height
    }
}

/// `" "` followed by `<a class="{class}" href="#">{label}</a>`, or nothing
/// for an empty label.
fn affordance_nodes(label: &str, class: &str) -> Result<Vec<MarkupNode>, TruncateError> {
    if label.is_empty() {
        return Ok(Vec::new());
    }
    let label_nodes = parse_fragment(label)?.children().to_vec();
    Ok(vec![
        MarkupNode::text(" "),
        MarkupNode::element("a")
            .with_attribute("class", class)
            .with_attribute("href", "#")
            .with_children(label_nodes),
    ])
}

/// Whether `node` is a show/hide affordance link.
pub fn is_affordance(node: &MarkupNode) -> bool {
    node.is_hyperlink()
        && matches!(
            node.attribute("class"),
            Some(SHOW_AFFORDANCE_CLASS) | Some(HIDE_AFFORDANCE_CLASS)
        )
}
