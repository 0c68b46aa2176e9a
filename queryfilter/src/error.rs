//! Errors surfaced by the extractors.
//!
//! Every variant describes a problem with the caller's input: the engine is
//! pure, so retrying an identical call never changes the outcome.

use crate::extractor::ExtractorKind;
use serde::Serialize;
use thiserror::Error;

/// A character-offset range into the analyzed query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Offset of the first character.
    pub start: usize,
    /// Offset just past the last character.
    pub end: usize,
}

impl Span {
    /// Creates a span covering `start..end`.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Errors returned by query filter extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The query text is not valid in its dialect.
    #[error("Failed to parse {dialect} query: {message}")]
    Parse {
        /// The dialect the query was parsed as.
        dialect: ExtractorKind,
        /// The parser's description of the problem.
        message: String,
        /// The query text that failed to parse.
        query: String,
        /// Where the problem is, when the parser reports it.
        span: Option<Span>,
    },

    /// Valid syntax the analyzer declines to interpret.
    #[error("Unsupported input: {0}")]
    Unsupported(String),

    /// The input asserts contradictory facts.
    #[error("Ambiguous input: {0}")]
    Ambiguous(String),

    /// A query envelope failed validation.
    #[error("Invalid query envelope: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl ExtractError {
    /// Returns the failure location for parse errors that carry one.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Parse { span, .. } => *span,
            _ => None,
        }
    }

    /// Returns a short machine-readable name for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse_error",
            Self::Unsupported(_) => "unsupported_input",
            Self::Ambiguous(_) => "ambiguous_input",
            Self::Invalid(_) => "invalid_input",
        }
    }
}

/// Result alias for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
