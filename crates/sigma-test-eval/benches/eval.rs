//! Evaluator benchmarks: compile cost by rule size, and match throughput
//! with and without config field mappings.


use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sigma_test_eval::{RuleEvaluator, parse_config};
use sigma_test_parser::parse_rule;

// ---------------------------------------------------------------------------
// Benchmark: compile a rule with N field conditions
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_rule");
    let config = parse_config(&datagen::gen_config()).unwrap();

    for n in [1, 10, 50] {
        let rule = parse_rule(&datagen::gen_rule(&mut datagen::rng(), n)).unwrap();
        group.bench_with_input(BenchmarkId::new("items", n), &rule, |b, rule| {
            b.iter(|| {
                let evaluator = RuleEvaluator::new(black_box(rule), &[&config]).unwrap();
                black_box(evaluator);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: many events against one rule
// ---------------------------------------------------------------------------

fn bench_match_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_throughput");
    group.sample_size(20);

    let rule = parse_rule(&datagen::gen_rule(&mut datagen::rng(), 5)).unwrap();
    let config = parse_config(&datagen::gen_config()).unwrap();
    let unmapped = RuleEvaluator::new(&rule, &[]).unwrap();
    let mapped = RuleEvaluator::new(&rule, &[&config]).unwrap();

    for n_events in [1_000, 10_000] {
        group.throughput(Throughput::Elements(n_events as u64));

        let flat = datagen::gen_flat_events(n_events);
        group.bench_with_input(BenchmarkId::new("flat", n_events), &flat, |b, events| {
            b.iter(|| {
                let hits = events
                    .iter()
                    .filter(|e| unmapped.matches(black_box(e)).is_ok_and(|r| r.matched))
                    .count();
                black_box(hits);
            });
        });

        let ecs = datagen::gen_ecs_events(n_events);
        group.bench_with_input(BenchmarkId::new("mapped", n_events), &ecs, |b, events| {
            b.iter(|| {
                let hits = events
                    .iter()
                    .filter(|e| mapped.matches(black_box(e)).is_ok_and(|r| r.matched))
                    .count();
                black_box(hits);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_match_throughput);
criterion_main!(benches);
