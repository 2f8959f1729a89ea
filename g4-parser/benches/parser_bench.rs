use std::{fmt::Write as _, hint::black_box};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

/// A combined grammar with `rules` parser rules, each referencing the next
/// one and a handful of tokens.
fn synthetic_grammar(rules: usize) -> String {
    let mut text = String::from("grammar Bench;\noptions { caseInsensitive = false; }\n\n");
    for i in 0..rules {
        let _ = writeln!(
            text,
            "rule{i}: rule{} (COMMA ID)* # Alt{i}\n    | LPAREN rule{i} RPAREN\n    | ID+\n    ;",
            i + 1
        );
    }
    let _ = writeln!(text, "rule{rules}: ID;");
    text.push_str(
        "ID: [a-zA-Z_] [a-zA-Z0-9_]*;\nCOMMA: ',';\nLPAREN: '(';\nRPAREN: ')';\n\
         WS: [ \\t\\r\\n]+ -> skip;\n",
    );
    text
}

fn parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    for rules in [10, 100, 1_000] {
        let content = synthetic_grammar(rules);
        group.bench_with_input(BenchmarkId::new("parse", rules), &content, |b, input| {
            b.iter(|| black_box(g4_parser::parse(black_box(input))));
        });
    }

    // Same size, but every other rule is missing its terminating ';'
    let broken = synthetic_grammar(100).replacen("    ;\n", "\n", 50);
    group.bench_with_input(BenchmarkId::new("parse", "recovering"), &broken, |b, input| {
        b.iter(|| black_box(g4_parser::parse(black_box(input))));
    });

    group.bench_function("sniff_grammar_name", |b| {
        let content = synthetic_grammar(1_000);
        b.iter(|| black_box(g4_parser::sniff_grammar_name(black_box(&content))));
    });

    group.finish();
}

criterion_group!(benches, parse_benchmark);
criterion_main!(benches);
