//! Per-element truncation state and the host-owned registry of sessions.
//!
//! A session owns the untruncated fragment and the result of the last
//! search, renders the current view into its host, and moves between the
//! collapsed and expanded views on request. Construction and `update` never
//! emit events; `show` and `hide` emit their own event followed by
//! [`TruncateEvent::Toggle`].

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;

use crate::error::TruncateError;
use crate::markup::MarkupNode;
use crate::markup_codec::{markup_len, to_markup_string};
use crate::measure::{SandboxRequest, TruncateHost};
use crate::options::{
    is_affordance, ChangeDetection, OptionsPatch, ResolvedOptions, TruncateOptions,
};
use crate::search::{find_truncation_offset, SearchOutcome};
use crate::splice::{join, split_at};

/// Which view a session currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    /// The fragment fits untruncated; no affordances are shown.
    Fits,
    /// Truncated text plus the show affordance.
    Collapsed,
    /// Full text plus the hide affordance.
    Expanded,
}

/// Transition notifications delivered to the event sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TruncateEvent {
    Show,
    Hide,
    Toggle,
}

type EventSink = Box<dyn FnMut(TruncateEvent)>;

/// Truncation state for one element.
pub struct TruncationSession {
    options: TruncateOptions,
    resolved: ResolvedOptions,
    original: MarkupNode,
    outcome: SearchOutcome,
    state: DisplayState,
    last_rendered_length: Option<usize>,
    last_rendered_hash: Option<u64>,
    sink: Option<EventSink>,
}

impl fmt::Debug for TruncationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TruncationSession")
            .field("state", &self.state)
            .field("offset", &self.last_truncation_offset())
            .field("last_rendered_length", &self.last_rendered_length)
            .finish_non_exhaustive()
    }
}

impl TruncationSession {
    /// Truncate `fragment` for a new element and render the initial view.
    ///
    /// Fails with [`TruncateError::MissingLineHeight`] when the options carry
    /// no line height and the host cannot detect one.
    pub fn create<H: TruncateHost>(
        fragment: MarkupNode,
        options: TruncateOptions,
        host: &mut H,
    ) -> Result<Self, TruncateError> {
        let resolved = options.resolve(host.detected_line_height())?;
        let outcome = run_search(&fragment, &resolved, host);
        let state = initial_state(&outcome, &resolved);
        let mut session = Self {
            options,
            resolved,
            original: fragment,
            outcome,
            state,
            last_rendered_length: None,
            last_rendered_hash: None,
            sink: None,
        };
        session.render(host);
        Ok(session)
    }

    /// Deliver future transition events to `sink`.
    pub fn set_event_sink(&mut self, sink: impl FnMut(TruncateEvent) + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn options(&self) -> &TruncateOptions {
        &self.options
    }

    /// Merge `patch` into the options. Takes effect on the next `update`.
    pub fn set_options(&mut self, patch: &OptionsPatch) -> Result<(), TruncateError> {
        let mut next = self.options.clone();
        patch.apply(&mut next);
        self.reconfigure(next, Some(self.resolved.line_height))
    }

    fn reconfigure(
        &mut self,
        options: TruncateOptions,
        detected_line_height: Option<f32>,
    ) -> Result<(), TruncateError> {
        self.resolved = options.resolve(detected_line_height)?;
        self.options = options;
        Ok(())
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Untruncated fragment as last supplied or reconstructed.
    pub fn original(&self) -> &MarkupNode {
        &self.original
    }

    /// Committed offset of the last search; `None` when the fragment fits.
    pub fn last_truncation_offset(&self) -> Option<usize> {
        self.outcome.truncated.then_some(self.outcome.offset)
    }

    /// Serialized length of the last view this session rendered.
    pub fn last_rendered_length(&self) -> Option<usize> {
        self.last_rendered_length
    }

    /// Truncated fragment with the marker, when truncation happened.
    pub fn truncated_fragment(&self) -> Option<&MarkupNode> {
        self.outcome.truncated.then_some(&self.outcome.fragment)
    }

    /// Diagnostics of the most recent search.
    pub fn last_search(&self) -> &SearchOutcome {
        &self.outcome
    }

    /// Markup for the current state, affordances included.
    pub fn view(&self) -> MarkupNode {
        match self.state {
            DisplayState::Fits => self.original.clone(),
            DisplayState::Collapsed => self
                .outcome
                .fragment
                .clone()
                .with_trailing(&self.resolved.show_affordance),
            DisplayState::Expanded => self
                .original
                .clone()
                .with_trailing(&self.resolved.hide_affordance),
        }
    }

    /// Title text to show while collapsed, when enabled.
    pub fn tooltip(&self) -> Option<String> {
        (self.resolved.tooltip_from_plain_text && self.state == DisplayState::Collapsed)
            .then(|| self.original.plain_text())
    }

    /// Collapsed to expanded. Returns whether a transition happened.
    pub fn show<H: TruncateHost>(&mut self, host: &mut H) -> bool {
        if self.state != DisplayState::Collapsed {
            return false;
        }
        self.state = DisplayState::Expanded;
        self.render(host);
        self.emit(TruncateEvent::Show);
        self.emit(TruncateEvent::Toggle);
        true
    }

    /// Expanded to collapsed. Returns whether a transition happened.
    pub fn hide<H: TruncateHost>(&mut self, host: &mut H) -> bool {
        if self.state != DisplayState::Expanded {
            return false;
        }
        self.state = DisplayState::Collapsed;
        self.render(host);
        self.emit(TruncateEvent::Hide);
        self.emit(TruncateEvent::Toggle);
        true
    }

    /// Flip between collapsed and expanded; a no-op when the fragment fits.
    pub fn toggle<H: TruncateHost>(&mut self, host: &mut H) -> bool {
        match self.state {
            DisplayState::Collapsed => self.show(host),
            DisplayState::Expanded => self.hide(host),
            DisplayState::Fits => false,
        }
    }

    /// Re-run truncation, on `fragment` when given or else on the original
    /// with any out-of-band edits to the rendered markup spliced in.
    ///
    /// Edits are detected by comparing the host's rendered markup with what
    /// this session last rendered, by serialized length unless content
    /// hashing is configured. With length detection an edit that keeps the
    /// length unchanged goes unnoticed.
    pub fn update<H: TruncateHost>(&mut self, host: &mut H, fragment: Option<MarkupNode>) {
        let fragment = match fragment {
            Some(fragment) => fragment,
            None => self.reconstruct(host),
        };
        let outcome = run_search(&fragment, &self.resolved, host);
        self.state = match (self.state, outcome.truncated) {
            (_, false) => DisplayState::Fits,
            (DisplayState::Fits, true) => initial_state(&outcome, &self.resolved),
            (current, true) => current,
        };
        self.original = fragment;
        self.outcome = outcome;
        self.render(host);
    }

    fn reconstruct<H: TruncateHost>(&self, host: &H) -> MarkupNode {
        let Some(observed) = host.observed_markup() else {
            return self.original.clone();
        };
        if !self.rendered_changed(&observed) {
            return self.original.clone();
        }
        log::debug!("rendered markup changed since last render; splicing edits");
        let observed = strip_affordances(observed);
        match self.state {
            DisplayState::Fits => observed,
            DisplayState::Expanded => {
                let offset = self.outcome.offset;
                let head = split_at(&self.original, offset);
                let tail = split_at(&observed, offset);
                join(head.head, tail.tail, head.depth.min(tail.depth))
            }
            DisplayState::Collapsed => {
                let marker_len: usize = self.resolved.marker.iter().map(MarkupNode::text_len).sum();
                let visible = observed.text_len().saturating_sub(marker_len);
                let head = split_at(&observed, visible);
                let tail = split_at(&self.original, self.outcome.retained_len);
                join(head.head, tail.tail, head.depth.min(tail.depth))
            }
        }
    }

    fn rendered_changed(&self, observed: &MarkupNode) -> bool {
        match self.resolved.change_detection {
            ChangeDetection::Length => Some(markup_len(observed)) != self.last_rendered_length,
            ChangeDetection::ContentHash => {
                Some(content_hash(&to_markup_string(observed))) != self.last_rendered_hash
            }
        }
    }

    fn render<H: TruncateHost>(&mut self, host: &mut H) {
        let view = self.view();
        let serialized = to_markup_string(&view);
        self.last_rendered_length = Some(serialized.len());
        self.last_rendered_hash = match self.resolved.change_detection {
            ChangeDetection::ContentHash => Some(content_hash(&serialized)),
            ChangeDetection::Length => None,
        };
        host.render(&view);
        if self.resolved.tooltip_from_plain_text {
            host.set_tooltip(self.tooltip().as_deref());
        }
    }

    fn emit(&mut self, event: TruncateEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink(event);
        }
    }
}

fn run_search<H: TruncateHost>(
    fragment: &MarkupNode,
    resolved: &ResolvedOptions,
    host: &mut H,
) -> SearchOutcome {
    let request = SandboxRequest {
        line_height: resolved.line_height,
        context_scope: resolved.context_scope.as_deref(),
    };
    let mut sandbox = host.open_sandbox(&request);
    find_truncation_offset(fragment, resolved, &mut sandbox)
}

fn initial_state(outcome: &SearchOutcome, resolved: &ResolvedOptions) -> DisplayState {
    if !outcome.truncated {
        DisplayState::Fits
    } else if resolved.collapsed_initially {
        DisplayState::Collapsed
    } else {
        DisplayState::Expanded
    }
}

fn content_hash(serialized: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);
    hasher.finish()
}

/// Drop show/hide links and the single space rendered before each.
fn strip_affordances(node: MarkupNode) -> MarkupNode {
    match node {
        MarkupNode::Element {
            tag_name,
            attributes,
            children,
        } => {
            let mut kept: Vec<MarkupNode> = Vec::with_capacity(children.len());
            for child in children {
                if is_affordance(&child) {
                    drop_separator(&mut kept);
                    continue;
                }
                kept.push(strip_affordances(child));
            }
            MarkupNode::Element {
                tag_name,
                attributes,
                children: kept,
            }
        }
        text => text,
    }
}

fn drop_separator(kept: &mut Vec<MarkupNode>) {
    let emptied = match kept.last_mut() {
        Some(MarkupNode::Text { content }) if content.ends_with(' ') => {
            content.pop();
            content.is_empty()
        }
        _ => false,
    };
    if emptied {
        kept.pop();
    }
}

/// Host-owned sessions keyed by element identity.
pub struct SessionRegistry<K> {
    sessions: HashMap<K, TruncationSession>,
}

impl<K> Default for SessionRegistry<K> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> SessionRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `key`, or reconfigure and update the existing one.
    pub fn truncate<H: TruncateHost>(
        &mut self,
        key: K,
        fragment: MarkupNode,
        options: TruncateOptions,
        host: &mut H,
    ) -> Result<&mut TruncationSession, TruncateError> {
        match self.sessions.entry(key) {
            Entry::Occupied(slot) => {
                let session = slot.into_mut();
                session.reconfigure(options, host.detected_line_height())?;
                session.update(host, Some(fragment));
                Ok(session)
            }
            Entry::Vacant(slot) => {
                let session = TruncationSession::create(fragment, options, host)?;
                Ok(slot.insert(session))
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&TruncationSession> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut TruncationSession> {
        self.sessions.get_mut(key)
    }

    /// Forget the session for `key`, e.g. when its element goes away.
    pub fn remove(&mut self, key: &K) -> Option<TruncationSession> {
        self.sessions.remove(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::markup_codec::parse_fragment;
    use crate::measure::MonospaceHost;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    fn options() -> TruncateOptions {
        TruncateOptions::default()
            .with_line_height(10.0)
            .with_marker("...")
            .with_labels("more", "less")
    }

    fn recorded(session: &mut TruncationSession) -> Rc<RefCell<Vec<TruncateEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.set_event_sink(move |event| sink.borrow_mut().push(event));
        events
    }

    #[test]
    fn construction_collapses_without_events() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        let events = recorded(&mut session);
        assert_eq!(session.state(), DisplayState::Collapsed);
        assert!(events.borrow().is_empty());
        let rendered = host.rendered().expect("rendered");
        assert_eq!(to_markup_string(rendered), to_markup_string(&session.view()));
        assert!(to_markup_string(rendered).ends_with(r##" <a class="show" href="#">more</a>"##));
        assert_eq!(session.last_rendered_length(), Some(markup_len(rendered)));
    }

    #[test]
    fn missing_line_height_fails_creation() {
        let mut host = MonospaceHost::new(20, None);
        let err = TruncationSession::create(MarkupNode::text(FOX), TruncateOptions::default(), &mut host)
            .expect_err("no line height");
        assert_eq!(err, TruncateError::MissingLineHeight);
    }

    #[test]
    fn show_hide_toggle_emit_in_order() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        let events = recorded(&mut session);

        assert!(!session.hide(&mut host));
        assert!(session.show(&mut host));
        assert_eq!(session.state(), DisplayState::Expanded);
        assert_eq!(
            host.rendered().map(MarkupNode::plain_text),
            Some(format!("{} less", FOX))
        );
        assert!(session.toggle(&mut host));
        assert_eq!(session.state(), DisplayState::Collapsed);
        assert_eq!(
            *events.borrow(),
            vec![
                TruncateEvent::Show,
                TruncateEvent::Toggle,
                TruncateEvent::Hide,
                TruncateEvent::Toggle
            ]
        );
    }

    #[test]
    fn fitting_fragment_is_inert() {
        let mut host = MonospaceHost::new(80, None);
        let fragment = parse_fragment("<b>short</b> text").expect("parse");
        let mut session =
            TruncationSession::create(fragment.clone(), options(), &mut host).expect("create");
        let events = recorded(&mut session);
        assert_eq!(session.state(), DisplayState::Fits);
        assert_eq!(host.rendered(), Some(&fragment));
        assert_eq!(session.last_truncation_offset(), None);
        assert!(!session.toggle(&mut host));
        assert!(!session.show(&mut host));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn expanded_initially_when_configured() {
        let mut host = MonospaceHost::new(20, None);
        let mut opts = options();
        opts.collapsed_initially = false;
        let session =
            TruncationSession::create(MarkupNode::text(FOX), opts, &mut host).expect("create");
        assert_eq!(session.state(), DisplayState::Expanded);
        assert!(session.last_truncation_offset().is_some());
    }

    #[test]
    fn update_with_same_fragment_is_idempotent() {
        let mut host = MonospaceHost::new(20, None);
        let fragment = parse_fragment("<p>The quick <i>brown fox</i> jumps over the lazy dog</p>")
            .expect("parse");
        let mut session =
            TruncationSession::create(fragment.clone(), options(), &mut host).expect("create");
        session.update(&mut host, Some(fragment.clone()));
        let first = (session.last_truncation_offset(), session.view());
        session.update(&mut host, Some(fragment));
        let second = (session.last_truncation_offset(), session.view());
        assert_eq!(first, second);
    }

    #[test]
    fn update_keeps_displayed_state_and_moves_between_fits() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        let events = recorded(&mut session);
        session.show(&mut host);
        session.update(&mut host, Some(MarkupNode::text(format!("{} again", FOX))));
        assert_eq!(session.state(), DisplayState::Expanded);

        session.update(&mut host, Some(MarkupNode::text("tiny")));
        assert_eq!(session.state(), DisplayState::Fits);
        session.update(&mut host, Some(MarkupNode::text(FOX)));
        assert_eq!(session.state(), DisplayState::Collapsed);
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn unchanged_render_reuses_original() {
        let mut host = MonospaceHost::new(20, None);
        let fragment = parse_fragment("The <b>quick</b> brown fox jumps over the lazy dog")
            .expect("parse");
        let mut session =
            TruncationSession::create(fragment.clone(), options(), &mut host).expect("create");
        session.update(&mut host, None);
        assert_eq!(session.original(), &fragment);
    }

    #[test]
    fn expanded_edit_after_offset_is_spliced_in() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        session.show(&mut host);
        let edited = parse_fragment(&format!(
            r##"{} and cat <a class="hide" href="#">less</a>"##,
            FOX
        ))
        .expect("parse");
        host.edit_rendered(edited);
        session.update(&mut host, None);
        assert_eq!(
            session.original().plain_text(),
            format!("{} and cat", FOX)
        );
        assert_eq!(session.state(), DisplayState::Expanded);
    }

    #[test]
    fn collapsed_edit_in_visible_text_is_spliced_in() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        let retained = session.last_search().retained_len;
        let visible: String = FOX.chars().take(retained).collect();
        let edited = parse_fragment(&format!(
            r##"A {}... <a class="show" href="#">more</a>"##,
            visible
        ))
        .expect("parse");
        host.edit_rendered(edited);
        session.update(&mut host, None);
        assert_eq!(session.original().plain_text(), format!("A {}", FOX));
    }

    #[test]
    fn length_preserving_edit_needs_content_hash() {
        let fragment = MarkupNode::text(FOX);
        let swap = |host: &mut MonospaceHost| {
            let shown = host.rendered().map(to_markup_string).unwrap_or_default();
            let edited = parse_fragment(&shown.replacen("The", "THE", 1)).expect("parse");
            host.edit_rendered(edited);
        };

        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(fragment.clone(), options(), &mut host).expect("create");
        swap(&mut host);
        session.update(&mut host, None);
        assert!(session.original().plain_text().starts_with("The"));

        let mut host = MonospaceHost::new(20, None);
        let mut opts = options();
        opts.change_detection = ChangeDetection::ContentHash;
        let mut session = TruncationSession::create(fragment, opts, &mut host).expect("create");
        swap(&mut host);
        session.update(&mut host, None);
        assert!(session.original().plain_text().starts_with("THE"));
    }

    #[test]
    fn tooltip_follows_collapsed_state() {
        let mut host = MonospaceHost::new(20, None);
        let mut opts = options();
        opts.tooltip_from_plain_text = true;
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), opts, &mut host).expect("create");
        assert_eq!(host.tooltip(), Some(FOX));
        session.show(&mut host);
        assert_eq!(host.tooltip(), None);
        session.hide(&mut host);
        assert_eq!(session.tooltip().as_deref(), Some(FOX));
    }

    #[test]
    fn set_options_does_not_retrigger() {
        let mut host = MonospaceHost::new(20, None);
        let mut session =
            TruncationSession::create(MarkupNode::text(FOX), options(), &mut host).expect("create");
        let before = session.view();
        let patch = OptionsPatch {
            max_lines: Some(5),
            ..OptionsPatch::default()
        };
        session.set_options(&patch).expect("patch");
        assert_eq!(session.options().max_lines, 5);
        assert_eq!(session.view(), before);
        session.update(&mut host, None);
        assert_eq!(session.state(), DisplayState::Fits);
    }

    #[test]
    fn registry_creates_then_updates() {
        let mut host = MonospaceHost::new(20, None);
        let mut registry = SessionRegistry::new();
        registry
            .truncate("intro", MarkupNode::text(FOX), options(), &mut host)
            .expect("create");
        assert_eq!(registry.len(), 1);
        let session = registry
            .truncate("intro", MarkupNode::text("tiny"), options(), &mut host)
            .expect("update");
        assert_eq!(session.state(), DisplayState::Fits);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&"intro").is_some());
        assert!(registry.remove(&"intro").is_some());
        assert!(registry.is_empty());
    }
}
