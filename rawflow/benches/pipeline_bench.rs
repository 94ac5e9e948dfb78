//! Benchmarks for snapshot comparison.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rawflow::pipeline::{compare_pipelines, Snapshot};
use serde_json::json;

/// A raw source followed by a chain of `depth` filters.
fn chain(depth: usize, l_freq: f64) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert("raw".into(), json!({"type": "RawSource", "name": "raw"}));
    let mut parent = "raw".to_string();
    for i in 0..depth {
        let name = format!("f{i}");
        snapshot.insert(
            name.clone(),
            json!({"type": "RawFilter", "name": name, "source": parent, "args": [l_freq, 40.0], "kwargs": {}}),
        );
        parent = name;
    }
    snapshot
}

fn diff_benchmark(c: &mut Criterion) {
    let old = chain(200, 1.0);
    let unchanged = chain(200, 1.0);
    let mut changed = chain(200, 1.0);
    changed.insert("f0".into(), json!({"type": "RawFilter", "name": "f0", "source": "raw", "args": [0.5, 40.0], "kwargs": {}}));

    c.bench_function("compare_unchanged_chain", |b| {
        b.iter(|| compare_pipelines(black_box(&old), black_box(&unchanged)))
    });
    c.bench_function("compare_changed_root", |b| {
        b.iter(|| compare_pipelines(black_box(&old), black_box(&changed)))
    });
}

criterion_group!(benches, diff_benchmark);
criterion_main!(benches);
