//! Positioned lines and the line stream the block parser reads from.
//!
//! The input is split into [`Line`]s (using `memchr` for newline scanning),
//! each carrying its 1-based start and end [`Location`]. A [`LineStream`]
//! wraps those lines in a [`TransactionalCursor`] and adds the operations the
//! block grammar needs:
//!
//! - [`until`](LineStream::until) and [`unindented`](LineStream::unindented)
//!   derive a scoped stream that borrows its parent and ends where the scope
//!   ends (a marker line, or a line that is not indented enough);
//! - [`next_block`](LineStream::next_block) groups lines into blocks under the
//!   lazy continuation rule;
//! - [`skip_empty`](LineStream::skip_empty) drops paragraph separators.

use std::io::BufRead;

use memchr::memchr;

use crate::cursor::TransactionalCursor;
use crate::error::DocumentError;
use crate::span::Location;

/// A single line of input with its source span.
///
/// `content` never includes the line terminator. For lines seen through an
/// [`unindented`](LineStream::unindented) scope the stripped indentation is
/// gone from `content` and `start` has moved right accordingly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// The line text.
    pub content: String,
    /// Location of the first character of `content`.
    pub start: Location,
    /// Location one past the last character of `content`.
    pub end: Location,
}

impl Line {
    /// Create a line starting at `start`; `end` is derived from the content.
    pub fn new(content: impl Into<String>, start: Location) -> Self {
        let content = content.into();
        let end = start.advance(content.chars().count());
        Self {
            content,
            start,
            end,
        }
    }

    /// Check if this line contains only whitespace.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.content.chars().all(char::is_whitespace)
    }

    /// Check if the line starts with the given prefix.
    #[inline]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.content.starts_with(prefix)
    }

    /// Whether the first character is whitespace.
    #[inline]
    pub fn starts_with_whitespace(&self) -> bool {
        self.content.chars().next().is_some_and(char::is_whitespace)
    }

    /// Length of the leading run of spaces. Tabs do not count.
    #[inline]
    pub fn indentation(&self) -> usize {
        self.content.bytes().take_while(|&b| b == b' ').count()
    }

    /// Strip `columns` leading characters, all of which must be spaces.
    pub fn unindent(&self, columns: usize) -> Option<Line> {
        if self.indentation() < columns {
            return None;
        }
        Some(Line {
            content: self.content[columns..].to_string(),
            start: self.start.advance(columns),
            end: self.end,
        })
    }

    /// Undo [`unindent`](Line::unindent) by prepending `columns` spaces.
    pub fn reindent(&self, columns: usize) -> Line {
        let mut content = " ".repeat(columns);
        content.push_str(&self.content);
        Line {
            content,
            start: self.start.retreat(columns),
            end: self.end,
        }
    }
}

// ============================================================================
// Source decoding
// ============================================================================

/// Splits a byte buffer at `\n`, dropping the terminator and any trailing
/// `\r`. A final terminator does not produce an extra empty line.
struct RawLines<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> RawLines<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl<'a> Iterator for RawLines<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<&'a [u8]> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let start = self.offset;
        let end = match memchr(b'\n', &self.bytes[start..]) {
            Some(pos) => start + pos,
            None => self.bytes.len(),
        };
        self.offset = end + 1;
        Some(strip_carriage_returns(&self.bytes[start..end]))
    }
}

fn strip_carriage_returns(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

/// Split already decoded text into positioned lines.
pub fn split_lines(input: &str) -> Vec<Line> {
    RawLines::new(input.as_bytes())
        .enumerate()
        .map(|(index, raw)| {
            // Terminators are ASCII, so every slice ends on a char boundary.
            let text = std::str::from_utf8(raw).unwrap_or_default();
            Line::new(text, Location::new(index + 1, 1))
        })
        .collect()
}

/// Decode UTF-8 bytes into positioned lines.
///
/// Fails with [`DocumentError::Decode`] naming the first line that is not
/// valid UTF-8.
pub fn decode_lines(bytes: &[u8]) -> Result<Vec<Line>, DocumentError> {
    RawLines::new(bytes)
        .enumerate()
        .map(|(index, raw)| {
            let line = index + 1;
            let text = std::str::from_utf8(raw).map_err(|_| DocumentError::Decode { line })?;
            Ok(Line::new(text, Location::new(line, 1)))
        })
        .collect()
}

/// Read and decode every line from `reader`.
pub fn read_lines(mut reader: impl BufRead) -> Result<Vec<Line>, DocumentError> {
    let mut lines = Vec::new();
    let mut buffer = Vec::new();
    loop {
        let line = lines.len() + 1;
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|source| DocumentError::Io { line, source })?;
        if read == 0 {
            break;
        }
        let raw = buffer.strip_suffix(b"\n").unwrap_or(&buffer);
        let text = std::str::from_utf8(strip_carriage_returns(raw))
            .map_err(|_| DocumentError::Decode { line })?;
        lines.push(Line::new(text, Location::new(line, 1)));
    }
    Ok(lines)
}

// ============================================================================
// Line stream
// ============================================================================

/// Where a [`LineStream`] pulls its lines from.
trait Feed: Iterator<Item = Line> {
    /// Take back lines a dropped stream buffered but never handed out.
    fn restore(&mut self, lines: Vec<Line>);
}

/// Lines owned by the stream itself.
struct Owned(std::vec::IntoIter<Line>);

impl Iterator for Owned {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        self.0.next()
    }
}

impl Feed for Owned {
    fn restore(&mut self, _lines: Vec<Line>) {}
}

/// Lines from a parent stream up to the first line matching a predicate.
struct Until<'p, 'a, F> {
    parent: &'p mut LineStream<'a>,
    predicate: F,
    finished: bool,
}

impl<F: FnMut(&Line) -> bool> Iterator for Until<'_, '_, F> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.finished {
            return None;
        }
        let line = self.parent.next()?;
        if (self.predicate)(&line) {
            self.parent.push(line);
            self.finished = true;
            return None;
        }
        Some(line)
    }
}

impl<F: FnMut(&Line) -> bool> Feed for Until<'_, '_, F> {
    fn restore(&mut self, lines: Vec<Line>) {
        self.parent.push_many(lines);
    }
}

/// Lines from a parent stream with a fixed amount of indentation removed.
struct Unindented<'p, 'a> {
    parent: &'p mut LineStream<'a>,
    columns: usize,
    finished: bool,
}

impl Iterator for Unindented<'_, '_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.finished {
            return None;
        }
        let line = self.parent.next()?;
        if line.is_blank() {
            return Some(line);
        }
        match line.unindent(self.columns) {
            Some(stripped) => Some(stripped),
            None => {
                self.parent.push(line);
                self.finished = true;
                None
            }
        }
    }
}

impl Feed for Unindented<'_, '_> {
    fn restore(&mut self, lines: Vec<Line>) {
        let columns = self.columns;
        self.parent.push_many(lines.into_iter().map(|line| {
            if line.is_blank() {
                line
            } else {
                line.reindent(columns)
            }
        }));
    }
}

/// A transactional stream of positioned lines.
///
/// Streams derived with [`until`](Self::until) or
/// [`unindented`](Self::unindented) borrow their parent; lines they buffered
/// but never handed out go back to the parent when they are dropped.
pub struct LineStream<'a> {
    cursor: TransactionalCursor<Line, Box<dyn Feed + 'a>>,
    lineno: usize,
}

impl LineStream<'static> {
    /// Create a stream over owned lines.
    pub fn new(lines: Vec<Line>) -> Self {
        let lineno = lines.first().map_or(0, |line| line.start.line - 1);
        Self::from_feed(Box::new(Owned(lines.into_iter())), lineno)
    }

    /// Create a stream over the lines of `input`.
    pub fn from_text(input: &str) -> Self {
        Self::new(split_lines(input))
    }
}

impl<'a> LineStream<'a> {
    fn from_feed(feed: Box<dyn Feed + 'a>, lineno: usize) -> Self {
        Self {
            cursor: TransactionalCursor::new(feed),
            lineno,
        }
    }

    /// Number of lines consumed so far, net of push-backs.
    #[inline]
    pub fn lineno(&self) -> usize {
        self.lineno
    }

    /// Make `line` the next line returned.
    pub fn push(&mut self, line: Line) {
        self.lineno = self.lineno.saturating_sub(1);
        self.cursor.push(line);
    }

    /// Push several lines so that they are returned in the given order.
    pub fn push_many(&mut self, lines: impl IntoIterator<Item = Line>) {
        let lines: Vec<Line> = lines.into_iter().collect();
        for line in lines.into_iter().rev() {
            self.push(line);
        }
    }

    /// Look at the next line without consuming it.
    pub fn peek(&mut self) -> Option<Line> {
        self.cursor.peek()
    }

    /// Whether no lines remain.
    pub fn is_exhausted(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Collect up to `n` upcoming lines without consuming them.
    pub fn lookahead(
        &mut self,
        n: usize,
        allow_short: bool,
    ) -> Result<Vec<Line>, crate::error::EndOfStream> {
        self.cursor.lookahead(n, allow_short)
    }

    /// Run `attempt` inside a transaction.
    ///
    /// On `Err` every line consumed by the attempt is put back and the line
    /// counter is restored to its value before the attempt.
    pub fn try_with<R, E>(
        &mut self,
        attempt: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E> {
        let lineno = self.lineno;
        let mut transaction = self.cursor.begin_transaction();
        match attempt(self) {
            Ok(value) => {
                self.cursor.commit(&mut transaction);
                Ok(value)
            }
            Err(err) => {
                self.cursor.rollback(&mut transaction);
                self.lineno = lineno;
                Err(err)
            }
        }
    }

    /// Derive a stream that ends before the first line matching `predicate`.
    ///
    /// The matching line stays in this stream.
    pub fn until<'s, F>(&'s mut self, predicate: F) -> LineStream<'s>
    where
        F: FnMut(&Line) -> bool + 's,
    {
        let lineno = self.lineno;
        LineStream::from_feed(
            Box::new(Until {
                parent: self,
                predicate,
                finished: false,
            }),
            lineno,
        )
    }

    /// Derive a stream with `columns` columns of indentation removed.
    ///
    /// When `columns` is `None` it is inferred from the next non-blank line.
    /// The derived stream ends at the first non-blank line that is not
    /// indented by at least that much; that line stays in this stream. Blank
    /// lines pass through unchanged.
    pub fn unindented(&mut self, columns: Option<usize>) -> LineStream<'_> {
        let columns = columns.unwrap_or_else(|| self.next_indentation());
        let lineno = self.lineno;
        LineStream::from_feed(
            Box::new(Unindented {
                parent: self,
                columns,
                finished: false,
            }),
            lineno,
        )
    }

    /// Indentation of the next non-blank line, or 0 if there is none.
    pub fn next_indentation(&mut self) -> usize {
        let mut transaction = self.cursor.begin_transaction();
        let mut indentation = 0;
        while let Some(line) = self.cursor.next() {
            if !line.is_blank() {
                indentation = line.indentation();
                break;
            }
        }
        self.cursor.rollback(&mut transaction);
        indentation
    }

    /// Consume a run of blank lines, returning how many were skipped.
    pub fn skip_empty(&mut self) -> usize {
        let mut skipped = 0;
        while let Some(line) = self.next() {
            if !line.is_blank() {
                self.push(line);
                break;
            }
            skipped += 1;
        }
        skipped
    }

    /// Take the next block of lines.
    ///
    /// Leading blank lines are skipped. The block ends at a blank line unless
    /// the next non-blank line is indented, in which case the blank run is
    /// kept as a single empty line and the block continues.
    pub fn next_block(&mut self) -> Option<LineStream<'static>> {
        self.skip_empty();
        let mut lines = vec![self.next()?];
        while let Some(line) = self.next() {
            if !line.is_blank() {
                lines.push(line);
                continue;
            }
            let separator = line;
            let mut blanks = Vec::new();
            let mut following = None;
            while let Some(next) = self.next() {
                if next.is_blank() {
                    blanks.push(next);
                } else {
                    following = Some(next);
                    break;
                }
            }
            match following {
                Some(next) if next.starts_with_whitespace() => {
                    lines.push(Line::new(String::new(), separator.start));
                    lines.push(next);
                }
                Some(next) => {
                    self.push(next);
                    self.push_many(blanks);
                    self.push(separator);
                    break;
                }
                None => break,
            }
        }
        Some(LineStream::new(lines))
    }
}

impl Iterator for LineStream<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        let line = self.cursor.next()?;
        self.lineno += 1;
        Some(line)
    }
}

impl Drop for LineStream<'_> {
    fn drop(&mut self) {
        if self.cursor.depth() > 0 {
            return;
        }
        let leftover = self.cursor.take_pending();
        if !leftover.is_empty() {
            self.cursor.source_mut().restore(leftover);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stream(lines: &[&str]) -> LineStream<'static> {
        LineStream::from_text(&lines.join("\n"))
    }

    fn contents(stream: impl Iterator<Item = Line>) -> Vec<String> {
        stream.map(|line| line.content).collect()
    }

    #[test]
    fn strips_all_terminators() {
        let lines = split_lines("foo\nbar\r\nbaz\r\r\nspam");
        assert_eq!(contents(lines.into_iter()), vec!["foo", "bar", "baz", "spam"]);
    }

    #[test]
    fn trailing_newline_adds_no_line() {
        assert_eq!(split_lines("foo\n").len(), 1);
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("\n").len(), 1);
    }

    #[test]
    fn lines_carry_positions() {
        let lines = split_lines("foobar\nbäz");
        assert_eq!(lines[0].start, Location::new(1, 1));
        assert_eq!(lines[0].end, Location::new(1, 7));
        assert_eq!(lines[1].start, Location::new(2, 1));
        assert_eq!(lines[1].end, Location::new(2, 4));
    }

    #[test]
    fn decode_reports_offending_line() {
        let err = decode_lines(b"fine\nstill fine\nbad \xff byte\n").unwrap_err();
        assert!(matches!(err, DocumentError::Decode { line: 3 }));
    }

    #[test]
    fn read_lines_matches_split_lines() {
        let input = "foo\r\nbar\n\nbaz";
        let read = read_lines(input.as_bytes()).unwrap();
        assert_eq!(read, split_lines(input));
    }

    #[test]
    fn read_lines_reports_offending_line() {
        let err = read_lines(&b"ok\n\xc3\x28\n"[..]).unwrap_err();
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn indentation_counts_spaces_only() {
        let line = Line::new("\t  foo", Location::new(1, 1));
        assert_eq!(line.indentation(), 0);
        assert!(line.starts_with_whitespace());
        assert!(line.unindent(1).is_none());

        let line = Line::new("  \tfoo", Location::new(1, 1));
        assert_eq!(line.indentation(), 2);
        assert_eq!(line.unindent(2).unwrap().content, "\tfoo");
        assert!(line.unindent(3).is_none());
    }

    #[test]
    fn tabs_survive_unindented_scope() {
        let mut s = stream(&["  \tfoo", "\t bar"]);
        {
            let mut inner = s.unindented(Some(2));
            assert_eq!(inner.peek().unwrap().content, "\tfoo");
        }
        assert_eq!(contents(s.unindented(Some(2))), vec!["\tfoo"]);
        assert_eq!(contents(s), vec!["\t bar"]);
    }

    #[test]
    fn push_rewinds_the_counter() {
        let mut s = stream(&["foo", "bar"]);
        let line = s.next().unwrap();
        assert_eq!(s.lineno(), 1);
        s.push(line);
        assert_eq!(s.lineno(), 0);
        assert_eq!(s.next().unwrap().start.line, 1);
    }

    #[test]
    fn failed_attempt_restores_lines_and_counter() {
        let mut s = stream(&["foo", "bar", "baz"]);
        s.next();
        let result: Result<(), ()> = s.try_with(|s| {
            s.next();
            s.next();
            Err(())
        });
        assert!(result.is_err());
        assert_eq!(s.lineno(), 1);
        assert_eq!(contents(s), vec!["bar", "baz"]);
    }

    #[test]
    fn until_leaves_matching_line_in_parent() {
        let mut s = stream(&["foo", "bar", "baz"]);
        {
            let until = s.until(|line| line.content == "baz");
            let lines: Vec<Line> = until.collect();
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[1].start, Location::new(2, 1));
            assert_eq!(lines[1].end, Location::new(2, 4));
        }
        assert_eq!(contents(s), vec!["baz"]);
    }

    #[test]
    fn unindented_shifts_columns() {
        let mut s = stream(&["  foo", "  bar", "  baz"]);
        let lines: Vec<Line> = s.unindented(Some(2)).collect();
        for (index, line) in lines.iter().enumerate() {
            assert_eq!(line.start, Location::new(index + 1, 3));
            assert_eq!(line.end, Location::new(index + 1, 6));
        }
        assert_eq!(contents(lines.into_iter()), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn unindented_ends_at_shallower_line() {
        let mut s = stream(&["  foo", "  bar", " baz"]);
        assert_eq!(contents(s.unindented(Some(2))), vec!["foo", "bar"]);
        assert_eq!(contents(s), vec![" baz"]);

        let mut s = stream(&["foo"]);
        assert!(s.unindented(Some(2)).next().is_none());
        assert_eq!(contents(s), vec!["foo"]);
    }

    #[test]
    fn unindented_infers_from_next_non_blank_line() {
        let mut s = stream(&["", "   foo", "", "   bar", "baz"]);
        assert_eq!(contents(s.unindented(None)), vec!["", "foo", "", "bar"]);
        assert_eq!(contents(s), vec!["baz"]);
    }

    #[test]
    fn nested_scopes_return_leftovers_to_root() {
        let mut s = stream(&["  foo", " bar", "- baz"]);
        {
            let mut until = s.until(|line| line.starts_with("-"));
            let mut inner = until.unindented(Some(2));
            assert_eq!(inner.next().unwrap().content, "foo");
            assert!(inner.next().is_none());
        }
        assert_eq!(contents(s), vec![" bar", "- baz"]);
    }

    #[test]
    fn dropped_scope_returns_peeked_lines() {
        let mut s = stream(&["  foo", "  bar"]);
        {
            let mut inner = s.unindented(Some(2));
            assert_eq!(inner.peek().unwrap().content, "foo");
        }
        assert_eq!(contents(s), vec!["  foo", "  bar"]);
    }

    #[test]
    fn skip_empty_counts_blank_lines() {
        let mut s = stream(&["", "  ", "foo"]);
        assert_eq!(s.skip_empty(), 2);
        assert_eq!(s.next().unwrap().content, "foo");
    }

    #[test]
    fn next_block_single_and_joined() {
        let mut s = stream(&["foobar"]);
        let block: Vec<Line> = s.next_block().unwrap().collect();
        assert_eq!(contents(block.clone().into_iter()), vec!["foobar"]);
        assert_eq!(block[0].start, Location::new(1, 1));
        assert_eq!(block[0].end, Location::new(1, 7));

        let mut s = stream(&["foo", "bar"]);
        assert_eq!(contents(s.next_block().unwrap()), vec!["foo", "bar"]);
        assert!(s.next_block().is_none());
    }

    #[test]
    fn next_block_splits_on_blank_lines() {
        let mut s = stream(&["foo", "", "", "bar"]);
        assert_eq!(contents(s.next_block().unwrap()), vec!["foo"]);
        let block: Vec<Line> = s.next_block().unwrap().collect();
        assert_eq!(block[0].content, "bar");
        assert_eq!(block[0].start, Location::new(4, 1));
        assert!(s.next_block().is_none());
    }

    #[test]
    fn next_block_lazy_continuation() {
        let mut s = stream(&["foo", "", "", " bar"]);
        let block: Vec<Line> = s.next_block().unwrap().collect();
        assert_eq!(contents(block.clone().into_iter()), vec!["foo", "", " bar"]);
        assert_eq!(block[1].start, Location::new(2, 1));
        assert_eq!(block[2].start, Location::new(4, 1));
        assert_eq!(block[2].end, Location::new(4, 5));
        assert!(s.next_block().is_none());
    }

    #[test]
    fn next_block_ends_after_trailing_blank() {
        let mut s = stream(&["foo", ""]);
        assert_eq!(contents(s.next_block().unwrap()), vec!["foo"]);
        assert!(s.next_block().is_none());
    }
}
