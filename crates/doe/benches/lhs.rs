use bbo_doe::{Lhs, LhsKind, SamplingMethod};
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::aview1;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_lhs(c: &mut Criterion) {
    let mut group = c.benchmark_group("doe");
    group.sample_size(10);
    let unit = aview1(&[0., 1.]);
    for dim in [2, 20] {
        for size in [20, 200] {
            for kind in [LhsKind::Classic, LhsKind::Maximin] {
                group.bench_function(format!("lhs-{kind:?}-{dim}-dim-{size}-size"), |b| {
                    let xlimits = unit.broadcast((dim, 2)).unwrap();
                    b.iter(|| {
                        std::hint::black_box(
                            Lhs::new(&xlimits)
                                .kind(kind)
                                .with_rng(Xoshiro256Plus::seed_from_u64(42))
                                .sample(size),
                        )
                    });
                });
            }
        }
    }
    group.finish();
}

criterion_group!(benches, criterion_lhs);
criterion_main!(benches);
