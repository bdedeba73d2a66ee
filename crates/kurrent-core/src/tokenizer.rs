//! Inline tokenizer.
//!
//! Turns the lines of a block into a flat list of [`Lexeme`]s. Markup
//! characters become tagged lexemes carrying a [`Mark`]; everything else is
//! gathered into untagged text lexemes. Physical lines are joined by a single
//! synthetic space positioned at the end of the earlier line.
//!
//! The tokenizer has two states. Outside brackets it recognises emphasis,
//! strong emphasis, escapes and `[`. Besides the inline markup characters,
//! `-`, `#`, `>` and `.` can be escaped so that text can start with what would
//! otherwise be a block marker. Inside a bracket group it recognises the
//! reference separators `](` and `][`, the field separator `|`, and the
//! closers `]` and `)`.
//!
//! A bracket group is scanned inside a character transaction. When the input
//! ends inside a group that never produced a `]`-bearing mark, the group is
//! rolled back and its `[` is kept as literal text.

use crate::cursor::{Transaction, TransactionalCursor};
use crate::lexer::Line;
use crate::span::Location;

/// Kind of a markup lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// `**`
    Strong,
    /// `*`
    Emphasis,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `](`
    LinkSeparator,
    /// `][`
    ReferenceSeparator,
    /// `|`
    Pipe,
    /// `)`
    CloseParen,
}

impl Mark {
    /// Source text of the mark.
    pub fn as_str(self) -> &'static str {
        match self {
            Mark::Strong => "**",
            Mark::Emphasis => "*",
            Mark::OpenBracket => "[",
            Mark::CloseBracket => "]",
            Mark::LinkSeparator => "](",
            Mark::ReferenceSeparator => "][",
            Mark::Pipe => "|",
            Mark::CloseParen => ")",
        }
    }
}

/// A positioned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    /// The text as it should appear if the lexeme is taken literally.
    pub text: String,
    /// `None` for plain text.
    pub mark: Option<Mark>,
    pub start: Location,
    pub end: Location,
}

impl Lexeme {
    /// An untagged text lexeme.
    pub fn literal(text: impl Into<String>, start: Location, end: Location) -> Self {
        Self {
            text: text.into(),
            mark: None,
            start,
            end,
        }
    }

    fn marked(mark: Mark, start: Location) -> Self {
        let text = mark.as_str();
        Self {
            text: text.to_string(),
            mark: Some(mark),
            start,
            end: start.advance(text.len()),
        }
    }
}

/// Tokenize the lines of one block.
pub fn tokenize(lines: &[Line]) -> Vec<Lexeme> {
    Tokenizer::new(lines).run()
}

#[derive(Debug, Clone)]
enum Item {
    Char(char, Location),
    /// Boundary between two physical lines, at the end of the earlier one.
    Break(Location),
}

/// An open bracket group.
struct Group {
    transaction: Transaction,
    /// Number of lexemes before the group's `[`.
    checkpoint: usize,
    open: Location,
    closed_bracket: bool,
}

struct Tokenizer {
    chars: TransactionalCursor<Item, std::vec::IntoIter<Item>>,
    lexemes: Vec<Lexeme>,
    group: Option<Group>,
    /// Set once a group ran into the end of input. No later group can find
    /// a closing bracket either.
    unclosed_to_end: bool,
}

impl Tokenizer {
    fn new(lines: &[Line]) -> Self {
        let mut items = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                items.push(Item::Break(lines[index - 1].end));
            }
            items.extend(
                line.content
                    .chars()
                    .enumerate()
                    .map(|(offset, c)| Item::Char(c, line.start.advance(offset))),
            );
        }
        Self {
            chars: TransactionalCursor::new(items.into_iter()),
            lexemes: Vec::new(),
            group: None,
            unclosed_to_end: false,
        }
    }

    fn run(mut self) -> Vec<Lexeme> {
        loop {
            match self.chars.next() {
                Some(Item::Break(at)) => self.emit(Lexeme::literal(" ", at, at.advance(1))),
                Some(Item::Char(c, at)) if self.group.is_some() => self.reference(c, at),
                Some(Item::Char(c, at)) => self.default(c, at),
                None => match self.group.take() {
                    Some(group) if !group.closed_bracket => self.abandon(group),
                    Some(mut group) => {
                        self.chars.commit(&mut group.transaction);
                        break;
                    }
                    None => break,
                },
            }
        }
        self.lexemes
    }

    fn default(&mut self, c: char, at: Location) {
        match c {
            '\\' => self.escape(at, |c| {
                matches!(c, '*' | '[' | ']' | '-' | '#' | '>' | '.')
            }),
            '*' if self.eat('*') => self.emit(Lexeme::marked(Mark::Strong, at)),
            '*' => self.emit(Lexeme::marked(Mark::Emphasis, at)),
            '[' if !self.unclosed_to_end => {
                let checkpoint = self.lexemes.len();
                self.emit(Lexeme::marked(Mark::OpenBracket, at));
                self.group = Some(Group {
                    transaction: self.chars.begin_transaction(),
                    checkpoint,
                    open: at,
                    closed_bracket: false,
                });
            }
            _ => self.literal_char(c, at, 1),
        }
    }

    fn reference(&mut self, c: char, at: Location) {
        match c {
            ']' if self.eat('(') => {
                self.emit(Lexeme::marked(Mark::LinkSeparator, at));
                self.saw_closing_bracket();
            }
            ']' if self.eat('[') => {
                self.emit(Lexeme::marked(Mark::ReferenceSeparator, at));
                self.saw_closing_bracket();
            }
            ']' => {
                self.emit(Lexeme::marked(Mark::CloseBracket, at));
                self.close_group();
            }
            '\\' => self.escape(at, |c| matches!(c, ']' | '|' | ')')),
            '|' => self.emit(Lexeme::marked(Mark::Pipe, at)),
            ')' => {
                self.emit(Lexeme::marked(Mark::CloseParen, at));
                self.close_group();
            }
            _ => self.literal_char(c, at, 1),
        }
    }

    fn escape(&mut self, at: Location, escapable: impl Fn(char) -> bool) {
        match self.chars.peek() {
            Some(Item::Char(c, _)) if escapable(c) => {
                self.chars.next();
                self.literal_char(c, at, 2);
            }
            _ => self.literal_char('\\', at, 1),
        }
    }

    /// Consume the next character if it is `expected`.
    fn eat(&mut self, expected: char) -> bool {
        match self.chars.peek() {
            Some(Item::Char(c, _)) if c == expected => {
                self.chars.next();
                true
            }
            _ => false,
        }
    }

    fn saw_closing_bracket(&mut self) {
        if let Some(group) = self.group.as_mut() {
            group.closed_bracket = true;
        }
    }

    fn close_group(&mut self) {
        if let Some(mut group) = self.group.take() {
            self.chars.commit(&mut group.transaction);
        }
    }

    /// Undo an unterminated group and keep its `[` as text.
    fn abandon(&mut self, mut group: Group) {
        log::debug!("unterminated bracket at {}, taken literally", group.open);
        self.chars.rollback(&mut group.transaction);
        self.lexemes.truncate(group.checkpoint);
        self.unclosed_to_end = true;
        self.literal_char('[', group.open, 1);
    }

    fn literal_char(&mut self, c: char, at: Location, width: usize) {
        self.emit(Lexeme::literal(c.to_string(), at, at.advance(width)));
    }

    /// Append a lexeme, merging adjacent untagged text.
    fn emit(&mut self, lexeme: Lexeme) {
        if lexeme.mark.is_none() {
            if let Some(last) = self.lexemes.last_mut().filter(|last| last.mark.is_none()) {
                last.text.push_str(&lexeme.text);
                last.end = lexeme.end;
                return;
            }
        }
        self.lexemes.push(lexeme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_lines;
    use pretty_assertions::assert_eq;

    fn lex(input: &str) -> Vec<(Option<Mark>, String)> {
        tokenize(&split_lines(input))
            .into_iter()
            .map(|lexeme| (lexeme.mark, lexeme.text))
            .collect()
    }

    fn text(s: &str) -> (Option<Mark>, String) {
        (None, s.to_string())
    }

    fn mark(m: Mark) -> (Option<Mark>, String) {
        (Some(m), m.as_str().to_string())
    }

    #[test]
    fn plain_text_is_one_lexeme() {
        assert_eq!(lex("foo bar"), vec![text("foo bar")]);
        assert!(lex("").is_empty());
    }

    #[test]
    fn lines_are_joined_by_a_space() {
        let lexemes = tokenize(&split_lines("foo\nbar"));
        assert_eq!(lexemes.len(), 1);
        assert_eq!(lexemes[0].text, "foo bar");
        assert_eq!(lexemes[0].start, Location::new(1, 1));
        assert_eq!(lexemes[0].end, Location::new(2, 4));
    }

    #[test]
    fn emphasis_marks() {
        assert_eq!(
            lex("*a* **b**"),
            vec![
                mark(Mark::Emphasis),
                text("a"),
                mark(Mark::Emphasis),
                text(" "),
                mark(Mark::Strong),
                text("b"),
                mark(Mark::Strong),
            ]
        );
    }

    #[test]
    fn escapes_span_two_columns() {
        let lexemes = tokenize(&split_lines(r"a\*b"));
        assert_eq!(lexemes.len(), 1);
        assert_eq!(lexemes[0].text, "a*b");
        assert_eq!(lexemes[0].end, Location::new(1, 5));
        assert_eq!(lex(r"\[x\]"), vec![text("[x]")]);
        assert_eq!(lex(r"\a"), vec![text(r"\a")]);
    }

    #[test]
    fn block_marker_escapes() {
        assert_eq!(lex(r"\- a"), vec![text("- a")]);
        assert_eq!(lex(r"12\. a"), vec![text("12. a")]);
        assert_eq!(lex(r"\# \> a"), vec![text("# > a")]);
        assert_eq!(
            lex(r"[a\-b]"),
            vec![mark(Mark::OpenBracket), text(r"a\-b"), mark(Mark::CloseBracket)]
        );
    }

    #[test]
    fn reference_group() {
        assert_eq!(
            lex("[t][k|p](s)"),
            vec![
                mark(Mark::OpenBracket),
                text("t"),
                mark(Mark::ReferenceSeparator),
                text("k"),
                mark(Mark::Pipe),
                text("p"),
                mark(Mark::LinkSeparator),
                text("s"),
                mark(Mark::CloseParen),
            ]
        );
    }

    #[test]
    fn emphasis_is_literal_inside_brackets() {
        assert_eq!(
            lex("[*a*]"),
            vec![mark(Mark::OpenBracket), text("*a*"), mark(Mark::CloseBracket)]
        );
    }

    #[test]
    fn reference_escapes() {
        assert_eq!(
            lex(r"[a\]b\|c]"),
            vec![mark(Mark::OpenBracket), text("a]b|c"), mark(Mark::CloseBracket)]
        );
    }

    #[test]
    fn unterminated_bracket_is_literal() {
        assert_eq!(lex("[foo *bar*"), vec![
            text("[foo "),
            mark(Mark::Emphasis),
            text("bar"),
            mark(Mark::Emphasis),
        ]);
        assert_eq!(lex("a [b [c"), vec![text("a [b [c")]);
    }

    #[test]
    fn unterminated_group_with_separator_is_kept() {
        assert_eq!(
            lex("[foo](bar"),
            vec![mark(Mark::OpenBracket), text("foo"), mark(Mark::LinkSeparator), text("bar")]
        );
    }

    #[test]
    fn marks_carry_positions() {
        let lexemes = tokenize(&split_lines("x **y**"));
        assert_eq!(lexemes[1].start, Location::new(1, 3));
        assert_eq!(lexemes[1].end, Location::new(1, 5));
        assert_eq!(lexemes[3].start, Location::new(1, 6));
    }
}
