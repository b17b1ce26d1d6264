//! Benchmark: recognize and translate long arithmetic expressions, with the
//! first-derivation and the whole-forest translation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use yaep::Grammar;

const EXPR: &str = r#"
TERM;
E : T          # 0
  | E '+' T    # plus (0 2)
  | E '-' T    # minus (0 2)
  ;
T : F          # 0
  | T '*' F    # mult (0 2)
  ;
F : 'n'        # 0
  | '(' E ')'  # 1
  ;
"#;

const AMBIGUOUS: &str = "TERM;\nS : 'a' # 0 | S S # pair (0 1);\n";

fn expression(terms: usize) -> Vec<i32> {
    let mut out = String::new();
    for i in 0..terms {
        if i > 0 {
            out.push(['+', '*', '-'][i % 3]);
        }
        if i % 5 == 0 {
            out.push_str("(n+n)");
        } else {
            out.push('n');
        }
    }
    out.chars().map(|c| c as i32).collect()
}

fn bench_expressions(c: &mut Criterion) {
    let mut grammar = Grammar::new().expect("grammar handle");
    grammar.parse_description(EXPR, true).expect("grammar loads");
    let mut group = c.benchmark_group("expression");
    for terms in [10usize, 100, 1000] {
        let input = expression(terms);
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| {
                let outcome = grammar.parse(black_box(input.iter().copied()));
                assert_eq!(outcome.status, 0);
                outcome.tree
            })
        });
    }
    group.finish();
}

fn bench_ambiguous_forest(c: &mut Criterion) {
    let mut grammar = Grammar::new().expect("grammar handle");
    grammar.parse_description(AMBIGUOUS, true).expect("grammar loads");
    grammar.set_one_parse_flag(false);
    let mut group = c.benchmark_group("ambiguous_forest");
    for len in [4usize, 8, 16] {
        let input = vec!['a' as i32; len];
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter(|| {
                let outcome = grammar.parse(black_box(input.iter().copied()));
                assert!(outcome.ambiguous);
                outcome.tree
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_expressions, bench_ambiguous_forest);
criterion_main!(benches);
