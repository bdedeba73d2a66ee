//! Source location tracking for AST nodes.
//!
//! Every node produced by the parser can carry a `start` and `end`
//! [`Location`]. Together they form a half-open span: `end` points one column
//! past the last covered character.

use std::fmt;

/// A 1-based `(line, column)` position in the source text.
///
/// Columns count Unicode scalar values, not bytes. Locations are ordered
/// lexicographically: first by line, then by column.
///
/// # Example
///
/// ```rust
/// use kurrent_core::span::Location;
///
/// let start = Location::new(1, 1);
/// let end = start.advance(6);
/// assert_eq!(end, Location::new(1, 7));
/// assert!(start < end);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number, starting at 1.
    pub column: usize,
}

impl Location {
    /// Create a new location.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Move `columns` columns to the right on the same line.
    #[inline]
    pub const fn advance(self, columns: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + columns,
        }
    }

    /// Move `columns` columns to the left on the same line, stopping at 1.
    #[inline]
    pub fn retreat(self, columns: usize) -> Self {
        Self {
            line: self.line,
            column: self.column.saturating_sub(columns).max(1),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_line_then_column() {
        assert!(Location::new(1, 1) < Location::new(1, 2));
        assert!(Location::new(1, 9) < Location::new(2, 1));
        assert!(Location::new(2, 1) > Location::new(1, 1));
        assert!(Location::new(1, 1) <= Location::new(1, 1));
        assert!(!(Location::new(1, 2) <= Location::new(1, 1)));
    }

    #[test]
    fn retreat_stops_at_first_column() {
        assert_eq!(Location::new(3, 4).retreat(2), Location::new(3, 2));
        assert_eq!(Location::new(3, 2).retreat(5), Location::new(3, 1));
    }

    #[test]
    fn display_is_line_colon_column() {
        assert_eq!(Location::new(12, 3).to_string(), "12:3");
    }
}
