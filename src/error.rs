//! Error types for markup parsing and truncation configuration.

use core::fmt;

/// Typed actual-vs-limit context attached to limit failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitContext {
    /// Which limit was exceeded (e.g. `max_depth`).
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured limit.
    pub limit: usize,
}

/// Structured error raised while tokenizing or decoding fragment markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional tokenizer/read offset in bytes.
    pub token_offset: Option<usize>,
    /// Optional typed actual-vs-limit context.
    pub limit: Option<LimitContext>,
}

impl MarkupError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            token_offset: None,
            limit: None,
        }
    }

    pub(crate) fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.token_offset = Some(token_offset);
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.limit = Some(LimitContext {
            kind,
            actual,
            limit,
        });
        self
    }
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(token_offset) = self.token_offset {
            write!(f, " [token_offset={}]", token_offset)?;
        }
        if let Some(limit) = self.limit {
            write!(
                f,
                " [limit_kind={} actual={} limit={}]",
                limit.kind, limit.actual, limit.limit
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for MarkupError {}

/// Truncation error.
#[derive(Clone, Debug, PartialEq)]
pub enum TruncateError {
    /// No line height was configured and the host could not detect one.
    MissingLineHeight,
    /// An option holds a value outside its allowed range.
    InvalidOption {
        option: &'static str,
        message: String,
    },
    /// Marker or affordance markup failed to parse.
    Markup(MarkupError),
}

impl TruncateError {
    pub(crate) fn invalid(option: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            message: message.into(),
        }
    }
}

impl fmt::Display for TruncateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLineHeight => write!(
                f,
                "no line height configured and none could be detected from the host"
            ),
            Self::InvalidOption { option, message } => {
                write!(f, "invalid option `{}`: {}", option, message)
            }
            Self::Markup(err) => write!(f, "markup error: {}", err),
        }
    }
}

impl std::error::Error for TruncateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Markup(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MarkupError> for TruncateError {
    fn from(value: MarkupError) -> Self {
        Self::Markup(value)
    }
}
