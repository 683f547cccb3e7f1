/* Concurrent throughput benchmarks for `OrdHashMap`.
 *
 * `insert_*` follows the shape of the dashmap insertion benchmarks: a rayon pool per thread
 * count, once with a guard per operation (`par_iter().for_each()`) and once with threads
 * spawned in a scope that keep one guard each.
 *
 * `mixed` replays the classic range-query workload on a pre-populated map: 10% range queries
 * of width below 100, 40% lookups, 25% inserts and 25% removes over a shared key space.
 */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ordhash::hasher::Identity;
use ordhash::OrdHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

const ITER: u64 = 32 * 1024;

/// Every key is below `2^KEY_BITS`.
const KEY_BITS: u32 = 16;

fn map() -> OrdHashMap<u64, u64> {
    OrdHashMap::builder()
        .initial_buckets(1 << 10)
        .concurrency_level(num_cpus::get() * 4)
        .hasher(Identity::with_bits(KEY_BITS))
        .build()
        .unwrap()
}

fn task_insert_u64_u64_guard_every_it() -> OrdHashMap<u64, u64> {
    let map = map();
    (0..ITER).into_par_iter().for_each(|i| {
        let guard = map.guard();
        map.insert(i, i + 7, &guard).unwrap();
    });
    map
}

fn insert_u64_u64_guard_every_it(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_ordhash_u64_u64_guard_every_it");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(task_insert_u64_u64_guard_every_it));
            },
        );
    }

    group.finish();
}

fn task_insert_u64_u64_guard_once(threads: usize) -> OrdHashMap<u64, u64> {
    let map = Arc::new(map());
    let inc = ITER / (threads as u64);

    rayon::scope(|s| {
        for t in 0..(threads as u64) {
            let m = map.clone();
            s.spawn(move |_| {
                let start = t * inc;
                let guard = m.guard();
                for i in start..(start + inc) {
                    m.insert(i, i + 7, &guard).unwrap();
                }
            });
        }
    });
    Arc::try_unwrap(map).unwrap_or_else(|_| panic!("map still shared"))
}

fn insert_u64_u64_guard_once(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_ordhash_u64_u64_guard_once");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(|| task_insert_u64_u64_guard_once(threads)));
            },
        );
    }

    group.finish();
}

fn task_mixed(map: &Arc<OrdHashMap<u64, u64>>, threads: usize) {
    let per_thread = ITER / (threads as u64);
    rayon::scope(|s| {
        for t in 0..threads {
            let m = map.clone();
            s.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let guard = m.guard();
                for _ in 0..per_thread {
                    let key = rng.gen_range(0..1 << KEY_BITS);
                    match rng.gen_range(0..100) {
                        0..=9 => {
                            let end = (key + rng.gen_range(0..100)).min((1 << KEY_BITS) - 1);
                            criterion::black_box(m.range_query(&key, &end, &guard));
                        }
                        10..=49 => {
                            criterion::black_box(m.contains(&key, &guard));
                        }
                        50..=74 => {
                            m.insert(key, key, &guard).unwrap();
                        }
                        _ => {
                            m.remove(&key, &guard);
                        }
                    }
                }
            });
        }
    });
}

fn mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_ordhash_u64_u64");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        let map = Arc::new(map());
        let mut rng = StdRng::seed_from_u64(0);
        map.populate(
            ITER as usize / 2,
            || rng.gen_range(0..1 << KEY_BITS),
            || 0,
            &map.guard(),
        )
        .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(|| task_mixed(&map, threads)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    insert_u64_u64_guard_every_it,
    insert_u64_u64_guard_once,
    mixed
);
criterion_main!(benches);
