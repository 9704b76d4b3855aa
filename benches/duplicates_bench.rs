//! Duplicate detection benchmarks
//!
//! Measures exact and near-duplicate clustering over synthetic Python
//! projects where a fraction of the function bodies are copies or
//! lightly edited copies of each other.
//!
//! ```bash
//! cargo bench --bench duplicates_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reclaim::analysis::DuplicateDetector;
use reclaim::config::Config;
use reclaim::discovery::{Language, SourceFile};
use reclaim::graph::{Graph, GraphBuilder};
use reclaim::parser::extract;
use reclaim::CancelToken;

/// One function per file; every fourth is a near copy of its predecessor
fn generate_project(functions: usize) -> Vec<SourceFile> {
    (0..functions)
        .map(|i| {
            let family = if i % 4 == 3 { i - 1 } else { i };
            let mut text = format!("def transform_{}(rows, factor):\n", i);
            for line in 0..20 {
                text.push_str(&format!(
                    "    rows = [r * factor + {} for r in rows if r > {}]\n",
                    family * 31 + line,
                    line
                ));
            }
            if i % 4 == 3 {
                text.push_str("    rows.reverse()\n");
            }
            text.push_str("    return rows\n");
            SourceFile::from_text(format!("pkg/module_{}.py", i), Language::Python, &text)
        })
        .collect()
}

fn build_graph(files: &[SourceFile]) -> Graph {
    let config = Config::default();
    let mut builder = GraphBuilder::new(&config);
    for file in files {
        builder.add_file(file, &extract(file));
    }
    builder.build().unwrap()
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicates/detect");
    let config = Config::default();
    let detector = DuplicateDetector::new(&config.duplicates);
    let cancel = CancelToken::new();

    for size in [100, 500, 2_000] {
        let graph = build_graph(&generate_project(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| detector.detect(black_box(graph), &cancel).unwrap())
        });
    }
    group.finish();
}

fn bench_thresholds(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicates/threshold");
    let graph = build_graph(&generate_project(500));
    let cancel = CancelToken::new();

    for threshold in [0.6, 0.8, 0.95] {
        let mut config = Config::default();
        config.duplicates.similarity_threshold = threshold;
        let detector = DuplicateDetector::new(&config.duplicates);
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &graph, |b, graph| {
            b.iter(|| detector.detect(black_box(graph), &cancel).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_detect, bench_thresholds);
criterion_main!(benches);
