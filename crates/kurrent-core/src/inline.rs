//! Inline parser.
//!
//! Builds inline nodes from the lexemes produced by
//! [`tokenize`](crate::tokenizer::tokenize). Tagged lexemes are attempted as
//! strong emphasis, emphasis or an inline extension, each inside a
//! transaction on the lexeme cursor. A mark that starts none of them is kept
//! as literal text, so unclosed markup degrades to its source text.
//!
//! Inline extensions are matched against a fixed list of templates, most
//! specific first:
//!
//! ```text
//! [text][type|primary](secondary)   [text][type|primary]
//! [text][primary](secondary)        [text][primary]
//! [type|primary](secondary)         [primary](secondary)
//! [type|primary]                    [primary]
//! ```
//!
//! If none matches, recovery templates accept a group cut short after a
//! `](` or `][` separator. The separator's `]` closes the extension and its
//! second character is kept as text.

use crate::ast::{Document, Node, NodeId};
use crate::cursor::TransactionalCursor;
use crate::error::{NoMatch, RuleResult};
use crate::lexer::Line;
use crate::span::Location;
use crate::tokenizer::{tokenize, Lexeme, Mark};

/// Parse the lines of a block into detached inline nodes.
pub fn parse_inline(document: &mut Document, lines: &[Line]) -> Vec<NodeId> {
    let mut parser = InlineParser {
        document,
        lexemes: TransactionalCursor::new(tokenize(lines).into_iter()),
    };
    match parser.parse_sequence(Open::default(), None) {
        Ok(nodes) => nodes,
        Err(NoMatch) => unreachable!("top-level inline sequence always matches"),
    }
}

/// Emphasis kinds currently open; a kind never nests within itself.
#[derive(Debug, Clone, Copy, Default)]
struct Open {
    strong: bool,
    emphasis: bool,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Text,
    Kind,
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy)]
enum Part {
    Field(Field),
    Mark(Mark),
}

use Field::{Kind, Primary, Secondary, Text};
use Mark::{CloseBracket, CloseParen, LinkSeparator, Pipe, ReferenceSeparator};

const fn f(field: Field) -> Part {
    Part::Field(field)
}

const fn m(mark: Mark) -> Part {
    Part::Mark(mark)
}

/// Everything after the opening `[`.
#[rustfmt::skip]
const TEMPLATES: &[&[Part]] = &[
    &[f(Text), m(ReferenceSeparator), f(Kind), m(Pipe), f(Primary), m(LinkSeparator), f(Secondary), m(CloseParen)],
    &[f(Text), m(ReferenceSeparator), f(Kind), m(Pipe), f(Primary), m(CloseBracket)],
    &[f(Text), m(ReferenceSeparator), f(Primary), m(LinkSeparator), f(Secondary), m(CloseParen)],
    &[f(Text), m(ReferenceSeparator), f(Primary), m(CloseBracket)],
    &[f(Kind), m(Pipe), f(Primary), m(LinkSeparator), f(Secondary), m(CloseParen)],
    &[f(Primary), m(LinkSeparator), f(Secondary), m(CloseParen)],
    &[f(Kind), m(Pipe), f(Primary), m(CloseBracket)],
    &[f(Primary), m(CloseBracket)],
];

/// Groups cut short after a separator. The final mark is split.
#[rustfmt::skip]
const RECOVERY_TEMPLATES: &[&[Part]] = &[
    &[f(Text), m(ReferenceSeparator), f(Kind), m(Pipe), f(Primary), m(LinkSeparator)],
    &[f(Text), m(ReferenceSeparator), f(Primary), m(LinkSeparator)],
    &[f(Kind), m(Pipe), f(Primary), m(LinkSeparator)],
    &[f(Primary), m(LinkSeparator)],
    &[f(Primary), m(ReferenceSeparator)],
];

#[derive(Debug, Default)]
struct Fields {
    text: Option<String>,
    kind: Option<String>,
    primary: String,
    secondary: Option<String>,
}

impl Fields {
    fn set(&mut self, field: Field, value: String) {
        let value_or_none = (!value.is_empty()).then(|| value.clone());
        match field {
            Field::Text => self.text = value_or_none,
            Field::Kind => self.kind = value_or_none,
            Field::Primary => self.primary = value,
            Field::Secondary => self.secondary = value_or_none,
        }
    }
}

struct InlineParser<'d> {
    document: &'d mut Document,
    lexemes: TransactionalCursor<Lexeme, std::vec::IntoIter<Lexeme>>,
}

impl InlineParser<'_> {
    /// Parse nodes until `closer` (left unconsumed) or the end of input.
    ///
    /// Reaching the end while a closer is expected does not match.
    fn parse_sequence(&mut self, open: Open, closer: Option<Mark>) -> RuleResult<Vec<NodeId>> {
        let mut nodes = Vec::new();
        loop {
            let Some(lexeme) = self.lexemes.next() else {
                return match closer {
                    Some(_) => Err(NoMatch),
                    None => Ok(nodes),
                };
            };
            let Some(mark) = lexeme.mark else {
                self.append_text(&mut nodes, lexeme);
                continue;
            };
            self.lexemes.push(lexeme);
            if closer == Some(mark) {
                return Ok(nodes);
            }
            match self.parse_marked(mark, open) {
                Ok(node) => nodes.push(node),
                Err(NoMatch) => {
                    if let Some(literal) = self.lexemes.next() {
                        self.append_text(&mut nodes, literal);
                    }
                }
            }
        }
    }

    fn parse_marked(&mut self, mark: Mark, open: Open) -> RuleResult<NodeId> {
        match mark {
            Mark::Strong if !open.strong => self.attempt(|p| p.parse_strong(open)),
            Mark::Emphasis if !open.emphasis => self.attempt(|p| p.parse_emphasis(open)),
            Mark::OpenBracket => self.attempt(|p| p.parse_inline_extension()),
            _ => Err(NoMatch),
        }
    }

    /// Run `rule` speculatively, discarding its lexeme consumption and any
    /// nodes it allocated if it does not match.
    fn attempt(&mut self, rule: impl FnOnce(&mut Self) -> RuleResult<NodeId>) -> RuleResult<NodeId> {
        let checkpoint = self.document.checkpoint();
        let mut transaction = self.lexemes.begin_transaction();
        match rule(self) {
            Ok(node) => {
                self.lexemes.commit(&mut transaction);
                Ok(node)
            }
            Err(NoMatch) => {
                self.lexemes.rollback(&mut transaction);
                self.document.rollback_to(checkpoint);
                Err(NoMatch)
            }
        }
    }

    fn parse_strong(&mut self, open: Open) -> RuleResult<NodeId> {
        let inner = Open {
            strong: true,
            ..open
        };
        self.parse_delimited(Mark::Strong, Node::Strong, inner)
    }

    fn parse_emphasis(&mut self, open: Open) -> RuleResult<NodeId> {
        let inner = Open {
            emphasis: true,
            ..open
        };
        self.parse_delimited(Mark::Emphasis, Node::Emphasis, inner)
    }

    fn parse_delimited(&mut self, delimiter: Mark, node: Node, open: Open) -> RuleResult<NodeId> {
        let opening = self.expect(delimiter)?;
        let children = self.parse_sequence(open, Some(delimiter))?;
        let closing = self.expect(delimiter)?;
        let id = self.document.create_spanned(node, opening.start, closing.end);
        self.document.add_children(id, children);
        Ok(id)
    }

    fn parse_inline_extension(&mut self) -> RuleResult<NodeId> {
        let opening = self.expect(Mark::OpenBracket)?;
        for template in TEMPLATES {
            if let Ok(node) = self.attempt(|p| p.match_template(opening.start, template, false)) {
                return Ok(node);
            }
        }
        for template in RECOVERY_TEMPLATES {
            if let Ok(node) = self.attempt(|p| p.match_template(opening.start, template, true)) {
                log::trace!("recovered unterminated reference at {}", opening.start);
                return Ok(node);
            }
        }
        Err(NoMatch)
    }

    fn match_template(&mut self, start: Location, parts: &[Part], recovery: bool) -> RuleResult<NodeId> {
        let mut fields = Fields::default();
        let mut end = start;
        for (index, part) in parts.iter().enumerate() {
            match *part {
                Part::Field(field) => {
                    if let Some(value) = self.next_untagged() {
                        fields.set(field, value.text);
                    }
                }
                Part::Mark(mark) => {
                    let lexeme = self.expect(mark)?;
                    if recovery && index + 1 == parts.len() {
                        end = lexeme.start.advance(1);
                        let rest: String = lexeme.text.chars().skip(1).collect();
                        self.lexemes.push(Lexeme::literal(rest, end, lexeme.end));
                    } else {
                        end = lexeme.end;
                    }
                }
            }
        }
        if fields.primary.is_empty() {
            return Err(NoMatch);
        }
        let node = Node::InlineExtension {
            kind: fields.kind,
            primary: fields.primary,
            secondary: fields.secondary,
            text: fields.text,
        };
        Ok(self.document.create_spanned(node, start, end))
    }

    fn expect(&mut self, mark: Mark) -> RuleResult<Lexeme> {
        match self.lexemes.next() {
            Some(lexeme) if lexeme.mark == Some(mark) => Ok(lexeme),
            _ => Err(NoMatch),
        }
    }

    fn next_untagged(&mut self) -> Option<Lexeme> {
        match self.lexemes.peek() {
            Some(lexeme) if lexeme.mark.is_none() => self.lexemes.next(),
            _ => None,
        }
    }

    /// Add literal text, extending a trailing text node if there is one.
    fn append_text(&mut self, nodes: &mut Vec<NodeId>, lexeme: Lexeme) {
        if let Some(&last) = nodes.last() {
            if let Node::Text { content } = self.document.node_mut(last) {
                content.push_str(&lexeme.text);
                self.document.set_end(last, lexeme.end);
                return;
            }
        }
        let text = self
            .document
            .create_spanned(Node::text(lexeme.text), lexeme.start, lexeme.end);
        nodes.push(text);
    }
}
