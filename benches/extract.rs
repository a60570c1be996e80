//! Criterion benchmarks of node count extraction on large divide outputs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use perft_diff::drain::CapturedOutput;
use perft_diff::extract::{extract, ExtractionPolicy};

/// Output of a chatty engine: `info` noise, one divide line per move and the
/// Stockfish-style total.
fn divide_output(moves: usize, noise: usize) -> CapturedOutput {
    let mut lines: Vec<String> = (0..noise)
        .map(|i| format!("info string hash table {i} of {noise} cleared"))
        .collect();
    lines.extend((0..moves).map(|i| format!("m{i:04}: {}", 1000 + i)));
    lines.push(String::new());
    lines.push(format!("Nodes searched: {}", moves * 1000));
    lines.push(String::new());
    CapturedOutput::from(lines)
}

fn extract_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("Extraction");
    for moves in [20, 218, 5000] {
        let output = divide_output(moves, 100);
        group.throughput(Throughput::Elements(output.len() as u64));
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            let _ = group.bench_with_input(
                BenchmarkId::new(format!("{policy:?}"), format!("{moves} moves")),
                &output,
                |b, output| {
                    b.iter(|| extract(std::hint::black_box(output), policy).unwrap());
                },
            );
        }
    }
    // Worst case for the scan: no line ever qualifies.
    let output = CapturedOutput::from(vec!["info depth 1 score cp nodes".to_string(); 10_000]);
    group.throughput(Throughput::Elements(output.len() as u64));
    let _ = group.bench_function("Scan/no count", |b| {
        b.iter(|| extract(std::hint::black_box(&output), ExtractionPolicy::Scan).unwrap_err());
    });
    group.finish();
}

criterion_group!(benches, extract_bench);
criterion_main!(benches);
