use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lcs35::session::Session;

fn bench_single_batch_step(c: &mut Criterion) {
    c.bench_function("work(1<<16)", |b| {
        b.iter_batched(
            Session::new,
            |mut session| session.work(black_box(1 << 16)),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_consistency_check(c: &mut Criterion) {
    let mut session = Session::new();
    session.work(1 << 16);
    c.bench_function("check() after one batch", |b| {
        b.iter(|| black_box(&session).check());
    });
}

criterion_group!(benches, bench_single_batch_step, bench_consistency_check);
criterion_main!(benches);
