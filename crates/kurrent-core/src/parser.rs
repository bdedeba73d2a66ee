//! Block parser for kurrent.
//!
//! The input is split into blocks by [`LineStream::next_block`]. Inside a
//! block, grammar rules are attempted in a fixed order, each inside a
//! transaction on the line stream; the first rule that matches wins and
//! Paragraph always matches. A rule that does not apply returns
//! [`NoMatch`], which rolls back both the lines it consumed and the nodes it
//! allocated.
//!
//! Nested structures (list items, block quotes, definition descriptions)
//! recurse into derived line streams that strip the structure's indentation.

use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Document, Node, NodeId};
use crate::error::{DocumentError, NoMatch, RuleResult};
use crate::inline::parse_inline;
use crate::lexer::{decode_lines, read_lines, split_lines, Line, LineStream};

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)\s*(.*)$").expect("valid regex"));
static ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("valid regex"));
static EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:([^\]|]*)\|)?([^\]]*)\]:\s*(.*)$").expect("valid regex")
});

/// Default limit on nested lists, quotes and definitions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Recorded on the document root.
    pub filename: Option<String>,
    /// Nesting depth past which list, quote and definition rules decline.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            filename: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// kurrent parser.
///
/// # Example
///
/// ```rust
/// use kurrent_core::{Node, Parser};
///
/// let doc = Parser::new().with_filename("notes.kur").parse_str("# Notes\n\n- one\n- two");
/// let kinds: Vec<_> = doc
///     .children(doc.root())
///     .iter()
///     .map(|&id| doc.node(id).name())
///     .collect();
/// assert_eq!(kinds, ["Header", "UnorderedList"]);
/// assert_eq!(doc.filename(), Some("notes.kur"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    /// Create a parser with default options.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with the given options.
    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Set the filename recorded on parsed documents.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.options.filename = Some(filename.into());
        self
    }

    /// Set the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Parse decoded text. Never fails.
    pub fn parse_str(&self, input: &str) -> Document {
        self.parse_lines(split_lines(input))
    }

    /// Parse UTF-8 bytes.
    pub fn parse_bytes(&self, input: &[u8]) -> Result<Document, DocumentError> {
        Ok(self.parse_lines(decode_lines(input)?))
    }

    /// Read and parse a whole document.
    pub fn parse_reader(&self, reader: impl BufRead) -> Result<Document, DocumentError> {
        Ok(self.parse_lines(read_lines(reader)?))
    }

    /// Parse lines that were already split and positioned.
    pub fn parse_lines(&self, lines: Vec<Line>) -> Document {
        log::debug!(
            "parsing {} lines from {}",
            lines.len(),
            self.options.filename.as_deref().unwrap_or("<input>")
        );
        let parser = BlockParser {
            document: Document::new(self.options.filename.clone()),
            max_depth: self.options.max_depth,
            depth: 0,
        };
        parser.parse_document(&mut LineStream::new(lines))
    }
}

/// Parse `input` with default options.
pub fn parse(input: &str) -> Document {
    Parser::new().parse_str(input)
}

type Rule = fn(&mut BlockParser, &mut LineStream<'_>) -> RuleResult<NodeId>;

const RULES: [(&str, Rule); 8] = [
    ("header", BlockParser::parse_header),
    ("unordered list", BlockParser::parse_unordered_list),
    ("ordered list", BlockParser::parse_ordered_list),
    ("extension", BlockParser::parse_extension),
    ("block quote", BlockParser::parse_block_quote),
    ("definition list", BlockParser::parse_definition_list),
    ("raw block", BlockParser::parse_raw_block),
    ("paragraph", BlockParser::parse_paragraph),
];

struct BlockParser {
    document: Document,
    max_depth: usize,
    depth: usize,
}

impl BlockParser {
    fn parse_document(mut self, lines: &mut LineStream<'_>) -> Document {
        let blocks = self.parse_blocks(lines);
        let root = self.document.root();
        self.document.add_children(root, blocks);
        self.document
    }

    /// Parse every block remaining in `lines`, returning detached nodes.
    fn parse_blocks(&mut self, lines: &mut LineStream<'_>) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        while let Some(mut block) = lines.next_block() {
            loop {
                block.skip_empty();
                if block.is_exhausted() {
                    break;
                }
                nodes.push(self.parse_block(&mut block));
            }
        }
        nodes
    }

    fn parse_block(&mut self, lines: &mut LineStream<'_>) -> NodeId {
        for (name, rule) in RULES {
            log::trace!("trying {name} at line {}", lines.lineno() + 1);
            if let Ok(node) = self.attempt(lines, rule) {
                return node;
            }
        }
        unreachable!("paragraph rejected non-empty input")
    }

    /// Run `rule` in a transaction, discarding its nodes if it does not match.
    fn attempt(&mut self, lines: &mut LineStream<'_>, rule: Rule) -> RuleResult<NodeId> {
        let checkpoint = self.document.checkpoint();
        let result = lines.try_with(|lines| rule(self, lines));
        if result.is_err() {
            log::trace!("rolled back to line {}", lines.lineno() + 1);
            self.document.rollback_to(checkpoint);
        }
        result
    }

    /// Run `f` one nesting level deeper.
    fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn check_depth(&self, what: &str, lines: &LineStream<'_>) -> RuleResult<()> {
        if self.depth >= self.max_depth {
            log::debug!(
                "{what} at line {} exceeds nesting depth {}",
                lines.lineno() + 1,
                self.max_depth
            );
            return Err(NoMatch);
        }
        Ok(())
    }

    fn parse_header(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        let line = lines.next().ok_or(NoMatch)?;
        let captures = HEADER.captures(&line.content).ok_or(NoMatch)?;
        let node = Node::Header {
            level: captures[1].len(),
            text: captures[2].trim_end().to_string(),
        };
        Ok(self.document.create_spanned(node, line.start, line.end))
    }

    fn parse_unordered_list(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        self.parse_list(lines, Node::UnorderedList, unordered_marker)
    }

    fn parse_ordered_list(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        self.parse_list(lines, Node::OrderedList, ordered_marker)
    }

    /// Every line of the block must belong to an item.
    ///
    /// The shape is checked before any item is parsed, so a block that is
    /// not a list is rejected without parsing its nested content.
    fn parse_list(
        &mut self,
        lines: &mut LineStream<'_>,
        kind: Node,
        marker: fn(&str) -> Option<usize>,
    ) -> RuleResult<NodeId> {
        self.check_depth("list", lines)?;
        if !is_list(lines, marker) {
            return Err(NoMatch);
        }
        let mut items = Vec::new();
        while let Some(line) = lines.next() {
            let width = marker(&line.content).ok_or(NoMatch)?;
            let at = line.start;
            lines.push(replace_prefix(&line, width));
            let children = {
                let mut until = lines.until(move |line| marker(&line.content).is_some());
                let mut item = until.unindented(Some(width));
                self.nested(|p| p.parse_blocks(&mut item))
            };
            let item = self.document.create(Node::ListItem);
            self.document.set_start(item, at);
            self.document.add_children(item, children);
            items.push(item);
        }
        if items.is_empty() {
            return Err(NoMatch);
        }
        let list = self.document.create(kind);
        self.document.add_children(list, items);
        Ok(list)
    }

    fn parse_extension(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        let line = lines.next().ok_or(NoMatch)?;
        let captures = EXTENSION.captures(&line.content).ok_or(NoMatch)?;
        let primary = captures[2].to_string();
        if primary.is_empty() {
            return Err(NoMatch);
        }
        let kind = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .filter(|kind| !kind.is_empty());
        let secondary = Some(captures[3].trim().to_string()).filter(|s| !s.is_empty());

        let mut end = line.end;
        let mut body = Vec::new();
        if lines.next_indentation() > 0 {
            let mut raw: Vec<Line> = lines.unindented(None).collect();
            trim_trailing_blank(&mut raw);
            if let Some(last) = raw.last() {
                end = last.end;
            }
            body = raw.into_iter().map(|line| line.content).collect();
        }
        let node = Node::Extension {
            kind,
            primary,
            secondary,
            body,
        };
        Ok(self.document.create_spanned(node, line.start, end))
    }

    /// A `>` line followed by more `>` lines or indented continuation lines.
    ///
    /// `>` and one following space are stripped from marker lines, up to two
    /// columns of indentation from continuation lines.
    fn parse_block_quote(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        self.check_depth("block quote", lines)?;
        let first = lines.next().ok_or(NoMatch)?;
        let mut quoted = vec![strip_quote_marker(&first).ok_or(NoMatch)?];
        while let Some(line) = lines.next() {
            if let Some(stripped) = strip_quote_marker(&line) {
                quoted.push(stripped);
            } else if line.is_blank() || line.starts_with_whitespace() {
                let columns = line.indentation().min(2);
                quoted.push(line.unindent(columns).unwrap_or(line));
            } else {
                lines.push(line);
                break;
            }
        }
        let mut inner = LineStream::new(quoted);
        let children = self.nested(|p| p.parse_blocks(&mut inner));
        let quote = self.document.create(Node::BlockQuote);
        self.document.set_start(quote, first.start);
        self.document.add_children(quote, children);
        Ok(quote)
    }

    fn parse_definition_list(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        self.check_depth("definition list", lines)?;
        let mut definitions = Vec::new();
        while let Ok(definition) = self.attempt(lines, BlockParser::parse_definition) {
            definitions.push(definition);
        }
        if definitions.is_empty() {
            return Err(NoMatch);
        }
        let list = self.document.create(Node::DefinitionList);
        self.document.add_children(list, definitions);
        Ok(list)
    }

    fn parse_definition(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        let mut term = Vec::new();
        while let Some(line) = lines.next() {
            if line.is_blank() || line.starts_with_whitespace() {
                lines.push(line);
                break;
            }
            term.push(line);
        }
        if term.is_empty() || lines.next_indentation() == 0 {
            return Err(NoMatch);
        }
        let description = {
            let mut description = lines.unindented(None);
            self.nested(|p| p.parse_blocks(&mut description))
        };
        if description.is_empty() {
            return Err(NoMatch);
        }
        let term = parse_inline(&mut self.document, &term);
        let definition = self.document.create(Node::Definition { terms: term.len() });
        self.document.add_children(definition, term);
        self.document.add_children(definition, description);
        Ok(definition)
    }

    fn parse_raw_block(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        let first = lines.peek().ok_or(NoMatch)?;
        if first.is_blank() || first.indentation() == 0 {
            return Err(NoMatch);
        }
        let mut raw: Vec<Line> = lines.unindented(None).collect();
        trim_trailing_blank(&mut raw);
        let end = raw.last().map_or(first.end, |line| line.end);
        let node = Node::RawBlock {
            lines: raw.into_iter().map(|line| line.content).collect(),
        };
        Ok(self.document.create_spanned(node, first.start, end))
    }

    fn parse_paragraph(&mut self, lines: &mut LineStream<'_>) -> RuleResult<NodeId> {
        let mut text = Vec::new();
        while let Some(line) = lines.next() {
            if line.is_blank() {
                lines.push(line);
                break;
            }
            text.push(line);
        }
        if text.is_empty() {
            return Err(NoMatch);
        }
        let children = parse_inline(&mut self.document, &text);
        let paragraph = self.document.create(Node::Paragraph);
        self.document.add_children(paragraph, children);
        Ok(paragraph)
    }
}

/// Width of a `-` marker and the whitespace after it.
fn unordered_marker(content: &str) -> Option<usize> {
    let rest = content.strip_prefix('-')?;
    Some(1 + rest.chars().take_while(|c| c.is_whitespace()).count())
}

/// Width of a `1.` marker and the whitespace after it.
fn ordered_marker(content: &str) -> Option<usize> {
    ORDERED_MARKER
        .find(content)
        .map(|m| content[..m.end()].chars().count())
}

/// Whether every remaining line is an item marker, a blank line, or a
/// continuation indented at least as far as the current item's marker.
/// Leaves `lines` where it was.
fn is_list(lines: &mut LineStream<'_>, marker: fn(&str) -> Option<usize>) -> bool {
    let block: Vec<Line> = lines.by_ref().collect();
    let mut width = None;
    let fits = block.iter().all(|line| {
        if let Some(marked) = marker(&line.content) {
            width = Some(marked);
            return true;
        }
        width.is_some_and(|width| line.is_blank() || line.unindent(width).is_some())
    });
    lines.push_many(block);
    fits && width.is_some()
}

fn strip_quote_marker(line: &Line) -> Option<Line> {
    let rest = line.content.strip_prefix('>')?;
    let (content, width) = match rest.strip_prefix(' ') {
        Some(content) => (content, 2),
        None => (rest, 1),
    };
    Some(Line {
        content: content.to_string(),
        start: line.start.advance(width),
        end: line.end,
    })
}

/// Replace the first `width` characters with spaces.
fn replace_prefix(line: &Line, width: usize) -> Line {
    let mut content = " ".repeat(width);
    content.extend(line.content.chars().skip(width));
    Line {
        content,
        start: line.start,
        end: line.end,
    }
}

fn trim_trailing_blank(lines: &mut Vec<Line>) {
    while lines.last().is_some_and(Line::is_blank) {
        lines.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers() {
        assert_eq!(unordered_marker("- foo"), Some(2));
        assert_eq!(unordered_marker("-foo"), Some(1));
        assert_eq!(unordered_marker("foo"), None);
        assert_eq!(ordered_marker("12. foo"), Some(4));
        assert_eq!(ordered_marker("1.foo"), Some(2));
        assert_eq!(ordered_marker("1 foo"), None);
    }

    #[test]
    fn list_shape() {
        let mut lines = LineStream::from_text("- a\n  b\n\n- c");
        assert!(is_list(&mut lines, unordered_marker));
        assert_eq!(lines.next().map(|line| line.content), Some("- a".to_string()));

        let mut lines = LineStream::from_text("- a\n b\n- c");
        assert!(!is_list(&mut lines, unordered_marker));
        assert_eq!(lines.count(), 3);

        assert!(!is_list(&mut LineStream::from_text("a\n- b"), unordered_marker));
        assert!(!is_list(&mut LineStream::from_text("- a"), ordered_marker));
    }

    #[test]
    fn replace_prefix_keeps_positions() {
        let line = Line::new("- foo", crate::span::Location::new(3, 5));
        let rewritten = replace_prefix(&line, 2);
        assert_eq!(rewritten.content, "  foo");
        assert_eq!(rewritten.start, line.start);
        assert_eq!(rewritten.end, line.end);
    }
}
