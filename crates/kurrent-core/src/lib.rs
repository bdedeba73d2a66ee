//! # kurrent core
//!
//! Parser for kurrent, a lightweight plain-text markup language, producing a
//! document tree with precise 1-based line/column spans.
//!
//! The grammar is locally ambiguous: a line starting with `-` may be a list
//! item or plain text, a `[` may open a reference or be literal text. Rules
//! are therefore attempted speculatively on a [`TransactionalCursor`] and
//! rolled back cleanly when they do not apply.
//!
//! ## Quick Start
//!
//! ```rust
//! use kurrent_core::{Node, Parser};
//!
//! let input = "# Hello World\n\nThis is a **paragraph**.";
//! let doc = Parser::new().parse_str(input);
//!
//! let blocks = doc.children(doc.root());
//! assert_eq!(blocks.len(), 2);
//! assert!(matches!(doc.node(blocks[0]), Node::Header { level: 1, .. }));
//! ```
//!
//! ## Decoding
//!
//! Byte input must be UTF-8. Decoding failures are reported with the line
//! they occurred on:
//!
//! ```rust
//! use kurrent_core::{DocumentError, Parser};
//!
//! let err = Parser::new().parse_bytes(b"fine\n\xff\n").unwrap_err();
//! assert!(matches!(err, DocumentError::Decode { line: 2 }));
//! ```
//!
//! ## Syntax
//!
//! - `#` headers, `- ` and `1. ` lists, `> ` quotes
//! - `term` followed by an indented description
//! - `[type|primary]: secondary` extensions with an indented body
//! - indented raw blocks
//! - `*emphasis*`, `**strong**`, `[text][type|primary](secondary)` inline
//!   extensions and `\` escapes

pub mod ast;
pub mod cursor;
pub mod error;
pub mod inline;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod tokenizer;
pub mod writer;

pub use ast::{Document, Node, NodeId};
pub use cursor::{Transaction, TransactionalCursor};
pub use error::{DocumentError, EndOfStream, NoMatch};
pub use lexer::{Line, LineStream};
pub use parser::{parse, Parser, ParserOptions};
pub use span::Location;
pub use writer::{to_kurrent, KurrentWriter};
