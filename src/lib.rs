//! Height-bounded truncation of rich-text markup fragments.
//!
//! `markup-truncate` cuts a markup tree at a plain-text offset without
//! splitting words or tags, then bisects over offsets with an injected
//! height oracle to find the longest prefix that fits a line budget.
//! [`TruncationSession`] keeps the per-element state needed to switch
//! between the truncated and full views and to re-truncate after edits.
//!
//! ```
//! use markup_truncate::{parse_fragment, MonospaceHost, TruncateOptions, TruncationSession};
//!
//! let fragment = parse_fragment("The quick brown fox jumps over the lazy dog").unwrap();
//! let options = TruncateOptions::default()
//!     .with_line_height(16.0)
//!     .with_marker("&#8230;")
//!     .with_labels("more", "less");
//! let mut host = MonospaceHost::new(24, None);
//! let session = TruncationSession::create(fragment, options, &mut host).unwrap();
//! assert!(session.last_truncation_offset().is_some());
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod error;
pub mod markup;
pub mod markup_codec;
pub mod measure;
pub mod options;
pub mod search;
pub mod session;
pub mod slicer;
pub mod splice;
pub mod word;

pub use error::{LimitContext, MarkupError, TruncateError};
pub use markup::{Attributes, MarkupNode, FRAGMENT_TAG};
pub use markup_codec::{
    markup_len, parse_fragment, parse_fragment_with_limits, to_markup_string, MarkupLimits,
};
pub use measure::{
    HeightMeasurer, MonospaceHost, MonospaceMeasurer, SandboxRequest, TruncateHost,
};
pub use options::{ChangeDetection, OptionsPatch, ResolvedOptions, TruncateOptions};
pub use search::{find_truncation_offset, SearchOutcome};
pub use session::{DisplayState, SessionRegistry, TruncateEvent, TruncationSession};
pub use slicer::{slice, slice_with_limits, Slice, SliceLimits};
pub use splice::{join, split_at, Split};
