//! Benchmarks for template rendering.
//!
//! Run with: `cargo bench`
//!
//! Compares cached renders against renders that compile every time, for a
//! plain template and for one that pulls in partials.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;
use tinplate::{
    plugin::{Partials, PartialsExt},
    Engine,
};

const LIST: &str = concat!(
    "<ul>[[ for (const item of items) { ]]",
    "<li class=\"[[= item.kind ]]\">[[= item.name ]]</li>",
    "[[ } ]]</ul>",
);

fn data(size: usize) -> serde_json::Value {
    let items: Vec<_> = (0..size)
        .map(|i| {
            let kind = if i % 2 == 0 { "even" } else { "odd" };
            json!({ "name": format!("item <{i}>"), "kind": kind })
        })
        .collect();
    json!({ "items": items })
}

fn bench_cached_vs_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    for size in [10usize, 100, 1000] {
        let data = data(size);
        group.throughput(Throughput::Elements(size as u64));

        let engine = Engine::new();
        group.bench_with_input(BenchmarkId::new("cached", size), &data, |b, data| {
            b.iter(|| engine.render(black_box(LIST), black_box(data)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("uncached", size), &data, |b, data| {
            b.iter(|| {
                engine.clear();
                engine.render(black_box(LIST), black_box(data)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_partials(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.use_plugin(Partials);
    engine.register_partial("header", "<header>[[= title ]]</header>").unwrap();
    engine.register_partial("footer", "<footer>&copy; [[= year ]]</footer>").unwrap();
    let data = json!({ "title": "Bench", "year": 2026 });

    c.bench_function("partials/header_footer", |b| {
        let template = "[[> header ]]<p>body</p>[[> footer ]]";
        b.iter(|| engine.render(black_box(template), black_box(&data)).unwrap())
    });
}

criterion_group!(benches, bench_cached_vs_uncached, bench_partials);
criterion_main!(benches);
