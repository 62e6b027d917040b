//! Benchmarks for the fixed-point kernel and pool pricing hot paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sundial_core::constants::{RONE, UNIT};
use sundial_math::curve::decay_price;
use sundial_math::fixed::{rln, rpow};
use sundial_math::swap::out_given_in;

fn bench_rpow(c: &mut Criterion) {
    c.bench_function("rpow_fractional", |b| {
        b.iter(|| rpow(black_box(RONE * 9 / 10), black_box(RONE * 7 / 2)).unwrap())
    });
}

fn bench_rln(c: &mut Criterion) {
    c.bench_function("rln", |b| {
        b.iter(|| rln(black_box(RONE * 414 / 100), black_box(RONE)).unwrap())
    });
}

fn bench_decay_price(c: &mut Criterion) {
    let duration = 180 * 24 * 3600u64;
    c.bench_function("decay_price_mid_life", |b| {
        b.iter(|| decay_price(black_box(duration / 3), black_box(duration)).unwrap())
    });
}

fn bench_swap_pricing(c: &mut Criterion) {
    let fee = RONE * 35 / 10_000;
    c.bench_function("out_given_in", |b| {
        b.iter(|| {
            out_given_in(
                black_box(1_000 * UNIT),
                black_box(RONE / 3),
                black_box(2_000 * UNIT),
                black_box(RONE * 2 / 3),
                black_box(50 * UNIT),
                black_box(fee),
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_rpow,
    bench_rln,
    bench_decay_price,
    bench_swap_pricing
);
criterion_main!(benches);
