//! Family-algebra and morphism benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench --bench algebra
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use fdd_rs::{HomFactory, Ref, Sfdd};

/// Encodes `count` pseudo-random members over keys `1..=width`.
fn random_family(dd: &Sfdd<u32>, rng: &mut ChaCha8Rng, count: usize, width: u32) -> Ref {
    let members: Vec<Vec<u32>> = (0..count)
        .map(|_| (1..=width).filter(|_| rng.gen_bool(0.3)).collect())
        .collect();
    dd.encode(members)
}

fn bench_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra");
    for count in [64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("union", count), &count, |b, &count| {
            let dd = Sfdd::<u32>::default();
            let mut rng = ChaCha8Rng::seed_from_u64(0xfdd);
            let families: Vec<Ref> = (0..32).map(|_| random_family(&dd, &mut rng, count, 24)).collect();
            let mut i = 0;
            b.iter(|| {
                i += 1;
                let a = families[i % families.len()];
                let g = families[(i * 7 + 3) % families.len()];
                dd.union(a, g)
            });
        });
        group.bench_with_input(BenchmarkId::new("intersection", count), &count, |b, &count| {
            let dd = Sfdd::<u32>::default();
            let mut rng = ChaCha8Rng::seed_from_u64(0xfdd);
            let families: Vec<Ref> = (0..32).map(|_| random_family(&dd, &mut rng, count, 24)).collect();
            let mut i = 0;
            b.iter(|| {
                i += 1;
                let a = families[i % families.len()];
                let g = families[(i * 5 + 1) % families.len()];
                dd.intersection(a, g)
            });
        });
    }
    group.finish();
}

fn bench_morphisms(c: &mut Criterion) {
    c.bench_function("saturated_insert_closure", |b| {
        let dd = Sfdd::<u32>::default();
        let homs = HomFactory::new(&dd);
        let mut rng = ChaCha8Rng::seed_from_u64(0xcafe);
        let family = random_family(&dd, &mut rng, 512, 24);

        // Members containing key 1 are closed under gaining key 20.
        let rule = homs.composition(&homs.insert([20]), &homs.filter_containing([1]));
        let step = homs.union(&homs.identity(), &homs.saturate(&rule));
        let closure = homs.fixed_point(&step);

        b.iter(|| closure.apply(family));
    });

    c.bench_function("encode_and_count", |b| {
        b.iter(|| {
            let dd = Sfdd::<u32>::default();
            let mut rng = ChaCha8Rng::seed_from_u64(0xbeef);
            let f = random_family(&dd, &mut rng, 512, 32);
            dd.count(f)
        });
    });
}

criterion_group!(benches, bench_algebra, bench_morphisms);
criterion_main!(benches);
