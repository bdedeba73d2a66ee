//! Serializer producing kurrent markup.
//!
//! Every node is written in three steps: open, children, close. Opening a
//! leaf writes the whole node and skips the children step. Indentation is a
//! stack of prefixes that is emitted after each pending line break, so nested
//! structures only need to push the width of their marker.
//!
//! ```rust
//! use kurrent_core::{parse, writer::to_kurrent};
//!
//! let doc = parse("# Title\n\n- one\n- *two*");
//! assert_eq!(to_kurrent(&doc), "# Title\n\n- one\n- *two*\n");
//! ```

use std::fmt::{self, Write};

use crate::ast::{Document, Node, NodeId};

/// Serialize a document to a string.
pub fn to_kurrent(document: &Document) -> String {
    let mut writer = KurrentWriter::new(String::new());
    // Writing to a String cannot fail.
    let _ = writer.write_document(document);
    writer.into_inner()
}

/// Escape inline markup characters in text.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape text that starts a line, where a leading `-`, `#`, `>` or `1.`
/// would be read back as a block marker.
pub fn escape_line_start(text: &str) -> String {
    let escaped = escape(text);
    if text.starts_with(['-', '#', '>']) {
        return format!("\\{escaped}");
    }
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && text[digits..].starts_with('.') {
        return format!("{}\\{}", &escaped[..digits], &escaped[digits..]);
    }
    escaped
}

/// Writes kurrent markup to any [`fmt::Write`] sink.
#[derive(Debug)]
pub struct KurrentWriter<W> {
    out: W,
    indents: Vec<String>,
    /// Line breaks not yet written; flushed before the next text.
    newlines: usize,
    /// Whether blocks are followed by an empty line. Off inside lists and
    /// definition lists.
    post_block_newline: bool,
    saved_post_block_newline: Vec<bool>,
    /// Set when the next node opens a paragraph or term line.
    line_start: bool,
    wrote_anything: bool,
}

impl<W: Write> KurrentWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indents: Vec::new(),
            newlines: 0,
            post_block_newline: true,
            saved_post_block_newline: Vec::new(),
            line_start: false,
            wrote_anything: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the whole document followed by a single line break.
    pub fn write_document(&mut self, document: &Document) -> fmt::Result {
        self.write_node(document, document.root())?;
        if self.wrote_anything {
            self.out.write_char('\n')?;
        }
        self.newlines = 0;
        Ok(())
    }

    /// Write `id` and its subtree.
    pub fn write_node(&mut self, document: &Document, id: NodeId) -> fmt::Result {
        if self.open(document, id)? {
            self.write_children(document, id)?;
        }
        self.close(document, id)
    }

    fn write_children(&mut self, document: &Document, id: NodeId) -> fmt::Result {
        for &child in document.children(id) {
            self.write_node(document, child)?;
        }
        Ok(())
    }

    /// Write the opening part of a node. Returns whether its children
    /// should be written next.
    fn open(&mut self, document: &Document, id: NodeId) -> Result<bool, fmt::Error> {
        let line_start = std::mem::take(&mut self.line_start);
        match document.node(id) {
            Node::Document { .. } | Node::ListItem => Ok(true),
            Node::Paragraph => {
                self.line_start = true;
                Ok(true)
            }
            Node::Emphasis => self.write("*").map(|_| true),
            Node::Strong => self.write("**").map(|_| true),
            Node::Text { content } if line_start => {
                self.write(&escape_line_start(content)).map(|_| false)
            }
            Node::Text { content } => self.write(&escape(content)).map(|_| false),
            Node::Header { text, level } => {
                self.write_line(&format!("{} {}", "#".repeat(*level), text))?;
                self.block_newline();
                Ok(false)
            }
            Node::UnorderedList => {
                self.write_list(document, id, |_| "- ".to_string())?;
                Ok(false)
            }
            Node::OrderedList => {
                self.write_list(document, id, |index| format!("{}. ", index + 1))?;
                Ok(false)
            }
            Node::BlockQuote => {
                self.write("> ")?;
                self.indents.push("  ".to_string());
                Ok(true)
            }
            Node::DefinitionList => {
                self.suspend_block_newline();
                Ok(true)
            }
            Node::Definition { .. } => {
                self.line_start = true;
                for &child in document.term(id) {
                    self.write_node(document, child)?;
                }
                self.line_start = false;
                self.newline();
                self.indents.push("  ".to_string());
                for &child in document.description(id) {
                    self.write_node(document, child)?;
                }
                self.indents.pop();
                Ok(false)
            }
            Node::RawBlock { lines } => {
                for line in lines {
                    if line.is_empty() {
                        self.newline();
                    } else {
                        self.write_line(&format!("    {line}"))?;
                    }
                }
                self.block_newline();
                Ok(false)
            }
            Node::Extension {
                kind,
                primary,
                secondary,
                body,
            } => {
                self.write("[")?;
                if let Some(kind) = kind {
                    self.write(kind)?;
                    self.write("|")?;
                }
                self.write(primary)?;
                self.write("]:")?;
                if let Some(secondary) = secondary {
                    self.write(" ")?;
                    self.write(secondary)?;
                }
                self.newline();
                self.indents.push("    ".to_string());
                self.write_lines(body)?;
                self.indents.pop();
                self.block_newline();
                Ok(false)
            }
            Node::InlineExtension {
                kind,
                primary,
                secondary,
                text,
            } => {
                self.write("[")?;
                if let Some(text) = text {
                    self.write(text)?;
                    self.write("][")?;
                }
                if let Some(kind) = kind {
                    self.write(kind)?;
                    self.write("|")?;
                }
                self.write(primary)?;
                self.write("]")?;
                if let Some(secondary) = secondary {
                    self.write("(")?;
                    self.write(secondary)?;
                    self.write(")")?;
                }
                Ok(false)
            }
        }
    }

    fn close(&mut self, document: &Document, id: NodeId) -> fmt::Result {
        match document.node(id) {
            Node::Paragraph => {
                self.newline();
                self.block_newline();
            }
            Node::Emphasis => self.write("*")?,
            Node::Strong => self.write("**")?,
            // The last quoted block already ended the line.
            Node::BlockQuote => {
                self.indents.pop();
            }
            Node::DefinitionList => {
                self.restore_block_newline();
                self.block_newline();
            }
            _ => {}
        }
        Ok(())
    }

    fn write_list(
        &mut self,
        document: &Document,
        id: NodeId,
        label: impl Fn(usize) -> String,
    ) -> fmt::Result {
        self.suspend_block_newline();
        for (index, &item) in document.children(id).iter().enumerate() {
            let label = label(index);
            self.write(&label)?;
            self.indents.push(" ".repeat(label.chars().count()));
            self.write_node(document, item)?;
            self.indents.pop();
        }
        self.restore_block_newline();
        self.block_newline();
        Ok(())
    }

    fn suspend_block_newline(&mut self) {
        self.saved_post_block_newline.push(self.post_block_newline);
        self.post_block_newline = false;
    }

    fn restore_block_newline(&mut self) {
        if let Some(saved) = self.saved_post_block_newline.pop() {
            self.post_block_newline = saved;
        }
    }

    fn block_newline(&mut self) {
        if self.post_block_newline {
            self.newline();
        }
    }

    fn newline(&mut self) {
        self.newlines += 1;
    }

    fn write(&mut self, text: &str) -> fmt::Result {
        if self.newlines > 0 {
            for _ in 0..self.newlines {
                self.out.write_char('\n')?;
            }
            self.newlines = 0;
            for indent in &self.indents {
                self.out.write_str(indent)?;
            }
        }
        self.wrote_anything = true;
        self.out.write_str(text)
    }

    fn write_line(&mut self, text: &str) -> fmt::Result {
        self.write(text)?;
        self.newline();
        Ok(())
    }

    /// Write verbatim lines; empty lines get no indentation.
    fn write_lines(&mut self, lines: &[String]) -> fmt::Result {
        for line in lines {
            if line.is_empty() {
                self.newline();
            } else {
                self.write_line(line)?;
            }
        }
        Ok(())
    }
}
