use criterion::{Criterion, criterion_group, criterion_main};
use core_text::PieceTreeTextBuffer;
use std::hint::black_box;

fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line {i} with some representative content\n"))
        .collect()
}

fn bench_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("piece_table_typing");
    group.sample_size(20);
    let base = sample_text(10_000);
    group.bench_function("insert_1000_chars_mid_document", |b| {
        b.iter(|| {
            let mut buffer = PieceTreeTextBuffer::new(&base);
            let mut at = buffer.len() / 2;
            for _ in 0..1000 {
                buffer.insert(at, "x").unwrap();
                at += 1;
            }
            black_box(buffer.len());
        });
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("piece_table_snapshot");
    let mut buffer = PieceTreeTextBuffer::new(&sample_text(10_000));
    for i in 0..500 {
        buffer.insert(i * 10, "edit").unwrap();
    }
    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(buffer.snapshot()));
    });
    group.bench_function("text_range_middle", |b| {
        let mid = buffer.len() / 2;
        b.iter(|| black_box(buffer.text(mid, 200).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_typing, bench_snapshot);
criterion_main!(benches);
