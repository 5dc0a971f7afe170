use aperture_core::math::{kmeans_lab, stable_hash};
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_stable_hash(c: &mut Criterion) {
    c.bench_function("stable_hash", |b| {
        b.iter(|| stable_hash("00000000-0000-0000-0000-000000000000"))
    });
}

fn bench_kmeans_lab(c: &mut Criterion) {
    let samples: Vec<(f32, f32, f32)> = (0..2000)
        .map(|i| {
            let t = i as f32 / 2000.0;
            (t * 100.0, (t - 0.5) * 200.0, (0.5 - t) * 200.0)
        })
        .collect();
    c.bench_function("kmeans_lab_2000_samples", |b| {
        b.iter(|| kmeans_lab(&samples, 5, 10))
    });
}

criterion_group!(benches, bench_stable_hash, bench_kmeans_lab);
criterion_main!(benches);
