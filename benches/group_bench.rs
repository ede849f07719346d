use coalescing_group::Group;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_execute_uncontended(c: &mut Criterion) {
    c.bench_function("group_execute_uncontended", |b| {
        let group: Group<String, u64, String> = Group::new();
        let mut keys = lcg(1).map(key);
        b.iter(|| {
            let k = keys.next().unwrap();
            black_box(group.execute(k, || Ok(1)));
        })
    });
}

fn bench_execute_same_key(c: &mut Criterion) {
    c.bench_function("group_execute_same_key_sequential", |b| {
        let group: Group<&'static str, u64, String> = Group::new();
        b.iter(|| black_box(group.execute("hot", || Ok(1))))
    });
}

fn bench_execute_contended(c: &mut Criterion) {
    const THREADS: usize = 8;
    c.bench_function("group_execute_contended_8_threads", |b| {
        let group: Group<&'static str, u64, String> = Group::new();
        b.iter(|| {
            let start = Barrier::new(THREADS);
            thread::scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        start.wait();
                        black_box(group.execute("hot", || {
                            thread::sleep(Duration::from_micros(50));
                            Ok(1)
                        }))
                    });
                }
            });
        })
    });
}

fn bench_execute_async_roundtrip(c: &mut Criterion) {
    c.bench_function("group_execute_async_recv", |b| {
        let group: Group<String, u64, String> = Group::new();
        let mut keys = lcg(7).map(key);
        b.iter(|| {
            let k = keys.next().unwrap();
            black_box(group.execute_async(k, || Ok(1)).recv());
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_execute_uncontended, bench_execute_same_key, bench_execute_contended,
        bench_execute_async_roundtrip
}
criterion_main!(benches);
