use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use exemplar::pool::{CacheSettings, ExampleCache, Verification};

fn build_example(record: &u64, _label: Option<&str>) -> anyhow::Result<Vec<u64>> {
    Ok(vec![*record; 64])
}

type Builder = fn(&u64, Option<&str>) -> anyhow::Result<Vec<u64>>;

fn cache(verification: Verification) -> ExampleCache<u64, Builder> {
    ExampleCache::new(
        build_example as Builder,
        CacheSettings::enabled(1024).with_verification(verification),
    )
    .unwrap()
}

fn pool_benchmarks(c: &mut Criterion) {
    c.bench_function("cache hit (strict)", |b| {
        let mut cache = cache(Verification::Strict);
        b.iter(|| {
            let example = cache.request(black_box(&42), None).unwrap();
            cache.give_back(example).unwrap();
        })
    });

    c.bench_function("cache hit (relaxed)", |b| {
        let mut cache = cache(Verification::Relaxed);
        b.iter(|| {
            let example = cache.request(black_box(&42), None).unwrap();
            cache.give_back(example).unwrap();
        })
    });

    c.bench_function("cache miss with eviction", |b| {
        b.iter_custom(|iters| {
            let mut cache = cache(Verification::Strict);

            let start = Instant::now();
            for record in 0..iters {
                let example = cache.request(black_box(&record), None).unwrap();
                cache.give_back(example).unwrap();
            }
            start.elapsed()
        })
    });

    c.bench_function("labelled request", |b| {
        let mut cache = cache(Verification::Strict);
        b.iter(|| {
            let example = cache.request(black_box(&42), Some("label")).unwrap();
            black_box(example);
        })
    });
}

criterion_group!(benches, pool_benchmarks);
criterion_main!(benches);
