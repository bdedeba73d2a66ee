//! Error types.
//!
//! There are two disjoint kinds of failure in the parser:
//!
//! - [`NoMatch`] is control flow. A grammar rule returns it to say "this rule
//!   does not apply here"; the enclosing transaction rolls the input back and
//!   the dispatcher tries the next rule. It never leaves the parser.
//! - [`DocumentError`] is fatal. It is raised while decoding the input and
//!   aborts the parse without producing a document.

use thiserror::Error;

/// A grammar rule did not match at the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("grammar rule does not match")]
pub struct NoMatch;

/// Result of attempting a single grammar rule.
pub type RuleResult<T> = Result<T, NoMatch>;

/// The stream ended before a strict lookahead could be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("unexpected end of stream")]
pub struct EndOfStream;

/// A fatal error raised while acquiring the document's lines.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A line is not valid UTF-8.
    #[error("line {line} is not valid UTF-8")]
    Decode {
        /// 1-based number of the offending line.
        line: usize,
    },
    /// The underlying reader failed.
    #[error("failed to read line {line}: {source}")]
    Io {
        /// 1-based number of the line being read.
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// The 1-based line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            DocumentError::Decode { line } | DocumentError::Io { line, .. } => *line,
        }
    }
}
