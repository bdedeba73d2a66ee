//! Benchmarks comparing kurrent parsing vs pulldown-cmark (Markdown)
//!
//! Run with: cargo bench -p kurrent-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kurrent_core::{inline, lexer, tokenizer, to_kurrent, Document, Parser};
use pulldown_cmark::{Options, Parser as MdParser};

/// Sample kurrent content
const KURRENT_SAMPLE: &str = r#"# Introduction

This is a paragraph with *emphasis*, **strong text** and a
[reference][link|https://example.com](homepage) spanning two lines.

## Lists

- First item with some content
- Second item with more content
  continued on another line
- Third item concluding the list

1. Step one of the process
2. Step two continues
   - with a nested point
   - and another one
3. Step three completes

## Code Example

    fn fibonacci(n: u64) -> u64 {
        match n {
            0 => 0,
            1 => 1,
            _ => fibonacci(n - 1) + fibonacci(n - 2),
        }
    }

## Definitions

parser
  Turns text into a tree.
writer
  Turns the tree back into text.

## Extension

[note|performance]: Backtracking
    Rules are attempted speculatively
    and rolled back when they do not apply.

## Quote

> The best code is no code at all.
> Every line of code you write is a liability.

End of document.
"#;

/// Equivalent Markdown content (as close as possible)
const MARKDOWN_SAMPLE: &str = r#"# Introduction

This is a paragraph with *emphasis*, **strong text** and a
[reference](https://example.com "homepage") spanning two lines.

## Lists

- First item with some content
- Second item with more content
  continued on another line
- Third item concluding the list

1. Step one of the process
2. Step two continues
   - with a nested point
   - and another one
3. Step three completes

## Code Example

    fn fibonacci(n: u64) -> u64 {
        match n {
            0 => 0,
            1 => 1,
            _ => fibonacci(n - 1) + fibonacci(n - 2),
        }
    }

## Definitions

**parser**
: Turns text into a tree.

**writer**
: Turns the tree back into text.

## Extension

> **Note: Backtracking**
>
> Rules are attempted speculatively
> and rolled back when they do not apply.

## Quote

> The best code is no code at all.
> Every line of code you write is a liability.

End of document.
"#;

fn bench_kurrent_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.throughput(Throughput::Bytes(KURRENT_SAMPLE.len() as u64));

    group.bench_function("kurrent", |b| {
        b.iter(|| {
            let doc = Parser::new().parse_str(black_box(KURRENT_SAMPLE));
            black_box(doc.len())
        })
    });

    group.throughput(Throughput::Bytes(MARKDOWN_SAMPLE.len() as u64));

    group.bench_function("markdown_pulldown", |b| {
        b.iter(|| {
            let parser = MdParser::new_ext(black_box(MARKDOWN_SAMPLE), Options::empty());
            let events: Vec<_> = parser.collect();
            black_box(events.len())
        })
    });

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for size in [1, 5, 10, 20].iter() {
        let kurrent_content: String = KURRENT_SAMPLE.repeat(*size);
        let markdown_content: String = MARKDOWN_SAMPLE.repeat(*size);

        group.throughput(Throughput::Bytes(kurrent_content.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("kurrent", size),
            &kurrent_content,
            |b, content| {
                b.iter(|| {
                    let doc = Parser::new().parse_str(black_box(content));
                    black_box(doc.len())
                })
            },
        );

        group.throughput(Throughput::Bytes(markdown_content.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("markdown", size),
            &markdown_content,
            |b, content| {
                b.iter(|| {
                    let parser = MdParser::new_ext(black_box(content), Options::empty());
                    let events: Vec<_> = parser.collect();
                    black_box(events.len())
                })
            },
        );
    }

    group.finish();
}

fn bench_inline_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline");

    let kurrent_inline = "This has *emphasis*, **strong**, [link](https://example.com), [text][ref|target] and \\* escapes.";
    let markdown_inline = "This has *emphasis*, **strong**, [link](https://example.com), [text][ref] and \\* escapes.";
    let lines = lexer::split_lines(kurrent_inline);

    group.bench_function("kurrent_tokenize", |b| {
        b.iter(|| black_box(tokenizer::tokenize(black_box(&lines)).len()))
    });

    group.bench_function("kurrent_inline", |b| {
        b.iter(|| {
            let mut doc = Document::new(None);
            let nodes = inline::parse_inline(&mut doc, black_box(&lines));
            black_box(nodes.len())
        })
    });

    group.bench_function("markdown_inline", |b| {
        b.iter(|| {
            let parser = MdParser::new_ext(black_box(markdown_inline), Options::empty());
            let events: Vec<_> = parser.collect();
            black_box(events.len())
        })
    });

    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    let doc = Parser::new().parse_str(&KURRENT_SAMPLE.repeat(10));
    let written = to_kurrent(&doc);

    group.throughput(Throughput::Bytes(written.len() as u64));
    group.bench_function("to_kurrent", |b| {
        b.iter(|| black_box(to_kurrent(black_box(&doc)).len()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_kurrent_parse,
    bench_scaling,
    bench_inline_parsing,
    bench_write
);
criterion_main!(benches);
