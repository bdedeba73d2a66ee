//! kurrent CLI - Parse, inspect, and normalize kurrent documents
//!
//! Usage:
//!   kurrent [OPTIONS] <COMMAND> <FILE>
//!
//! Commands:
//!   parse     Parse and display the document tree
//!   fmt       Print the normalized kurrent serialization
//!   stats     Show document statistics
//!
//! A FILE of `-` reads standard input.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::process;

use clap::{Parser as ClapParser, Subcommand};
use kurrent_core::{to_kurrent, Document, Node, NodeId, Parser};
use serde::Serialize;

#[derive(ClapParser)]
#[command(name = "kurrent", version, about = "kurrent document parser and formatter")]
struct Cli {
    /// Log parser decisions (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and display the document tree
    Parse {
        /// Document to parse, or `-` for standard input
        path: String,

        /// Output the tree as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Print the document in normalized kurrent syntax
    Fmt {
        /// Document to format, or `-` for standard input
        path: String,
    },
    /// Show document statistics
    Stats {
        /// Document to inspect, or `-` for standard input
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    let _ = builder.try_init();
}

fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Parse { path, json } => {
            let doc = load(path)?;
            if *json {
                print_json(&doc)
            } else {
                print_tree(&doc);
                Ok(())
            }
        }
        Command::Fmt { path } => {
            let doc = load(path)?;
            print!("{}", to_kurrent(&doc));
            Ok(())
        }
        Command::Stats { path } => {
            let doc = load(path)?;
            print_stats(&doc);
            Ok(())
        }
    }
}

fn load(path: &str) -> Result<Document, String> {
    if path == "-" {
        let stdin = io::stdin();
        return Parser::new()
            .with_filename("<stdin>")
            .parse_reader(stdin.lock())
            .map_err(|e| format!("failed to parse standard input: {}", e));
    }

    let bytes = fs::read(path).map_err(|e| format!("failed to read '{}': {}", path, e))?;
    log::info!("read {} bytes from {}", bytes.len(), path);
    Parser::new()
        .with_filename(path)
        .parse_bytes(&bytes)
        .map_err(|e| format!("failed to parse '{}': {}", path, e))
}

// =============================================================================
// JSON Output
// =============================================================================

#[derive(Serialize)]
struct JsonNode<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<JsonLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<JsonLocation>,
    #[serde(flatten)]
    attrs: JsonAttrs<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode<'a>>,
}

#[derive(Serialize)]
struct JsonLocation {
    line: usize,
    column: usize,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonAttrs<'a> {
    Document {
        filename: Option<&'a str>,
        metadata: &'a BTreeMap<String, String>,
    },
    Definition {
        terms: usize,
    },
    Text {
        content: &'a str,
    },
    Header {
        text: &'a str,
        level: usize,
    },
    RawBlock {
        lines: &'a [String],
    },
    Extension {
        kind: Option<&'a str>,
        primary: &'a str,
        secondary: Option<&'a str>,
        body: &'a [String],
    },
    InlineExtension {
        kind: Option<&'a str>,
        primary: &'a str,
        secondary: Option<&'a str>,
        text: Option<&'a str>,
    },
    Plain {},
}

fn print_json(doc: &Document) -> Result<(), String> {
    let tree = convert_node(doc, doc.root());
    let json = serde_json::to_string_pretty(&tree).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn convert_node(doc: &Document, id: NodeId) -> JsonNode<'_> {
    let node = doc.node(id);
    let attrs = match node {
        Node::Document { filename, metadata } => JsonAttrs::Document {
            filename: filename.as_deref(),
            metadata,
        },
        Node::Definition { terms } => JsonAttrs::Definition { terms: *terms },
        Node::Text { content } => JsonAttrs::Text { content },
        Node::Header { text, level } => JsonAttrs::Header {
            text,
            level: *level,
        },
        Node::RawBlock { lines } => JsonAttrs::RawBlock { lines },
        Node::Extension {
            kind,
            primary,
            secondary,
            body,
        } => JsonAttrs::Extension {
            kind: kind.as_deref(),
            primary,
            secondary: secondary.as_deref(),
            body,
        },
        Node::InlineExtension {
            kind,
            primary,
            secondary,
            text,
        } => JsonAttrs::InlineExtension {
            kind: kind.as_deref(),
            primary,
            secondary: secondary.as_deref(),
            text: text.as_deref(),
        },
        _ => JsonAttrs::Plain {},
    };
    let location = |loc: kurrent_core::Location| JsonLocation {
        line: loc.line,
        column: loc.column,
    };
    JsonNode {
        kind: node.name(),
        start: doc.start(id).map(location),
        end: doc.end(id).map(location),
        attrs,
        children: doc
            .children(id)
            .iter()
            .map(|&child| convert_node(doc, child))
            .collect(),
    }
}

// =============================================================================
// Text Output
// =============================================================================

fn print_tree(doc: &Document) {
    print_node(doc, doc.root(), 0);
}

fn print_node(doc: &Document, id: NodeId, depth: usize) {
    let prefix = "  ".repeat(depth);
    let span = match (doc.start(id), doc.end(id)) {
        (Some(start), Some(end)) => format!(" {}-{}", start, end),
        _ => String::new(),
    };
    println!("{}{}{}{}", prefix, doc.node(id).name(), span, describe(doc.node(id)));
    for &child in doc.children(id) {
        print_node(doc, child, depth + 1);
    }
}

fn describe(node: &Node) -> String {
    match node {
        Node::Document { filename, .. } => filename
            .as_ref()
            .map(|name| format!(" ({})", name))
            .unwrap_or_default(),
        Node::Text { content } => format!(" {:?}", content),
        Node::Header { text, level } => format!(" (level {}) {:?}", level, text),
        Node::RawBlock { lines } => format!(" ({} lines)", lines.len()),
        Node::Extension {
            kind,
            primary,
            secondary,
            body,
        } => format!(
            " kind={:?} primary={:?} secondary={:?} ({} body lines)",
            kind,
            primary,
            secondary,
            body.len()
        ),
        Node::InlineExtension {
            kind,
            primary,
            secondary,
            text,
        } => format!(
            " kind={:?} primary={:?} secondary={:?} text={:?}",
            kind, primary, secondary, text
        ),
        _ => String::new(),
    }
}

// =============================================================================
// Stats Command
// =============================================================================

fn print_stats(doc: &Document) {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut words = 0;
    let mut inline = 0;
    let mut max_depth = 0;
    for id in doc.traverse() {
        let node = doc.node(id);
        *counts.entry(node.name()).or_default() += 1;
        if node.is_inline() {
            inline += 1;
        }
        if let Node::Text { content } = node {
            words += content.split_whitespace().count();
        }
        let mut depth = 0;
        let mut current = doc.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = doc.parent(parent);
        }
        max_depth = max_depth.max(depth);
    }

    println!("Document Statistics");
    println!("-------------------");
    println!("File:         {}", doc.filename().unwrap_or("<input>"));
    println!("Blocks:       {}", doc.children(doc.root()).len());
    println!("Nodes:        {}", doc.len());
    println!("Inline nodes: {}", inline);
    println!("Depth:        {}", max_depth);
    println!("Words:        {}", words);
    if let Some(end) = doc.end(doc.root()) {
        println!("Last line:    {}", end.line);
    }
    println!();
    println!("Nodes by type:");
    for (name, count) in &counts {
        println!("  {:<16}{}", name, count);
    }
}
