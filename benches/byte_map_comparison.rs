use alloc::format;
use core::hint::black_box;

use chain_map::ByteMap;
use criterion::AxisScale;
use criterion::BatchSize;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;

extern crate alloc;

trait Workload {
    const VALUE_SIZE: usize;

    fn key(id: u64) -> Vec<u8>;
    fn value(id: u64) -> Vec<u8>;
}

struct ShortKeys;

impl Workload for ShortKeys {
    const VALUE_SIZE: usize = 8;

    fn key(id: u64) -> Vec<u8> {
        black_box(format!("key_{id:016X}").into_bytes())
    }

    fn value(id: u64) -> Vec<u8> {
        black_box(id.to_ne_bytes().to_vec())
    }
}

struct LongKeys;

impl Workload for LongKeys {
    const VALUE_SIZE: usize = 256;

    fn key(id: u64) -> Vec<u8> {
        black_box(format!("key_{id:064b}").into_bytes())
    }

    fn value(id: u64) -> Vec<u8> {
        let mut value = vec![0u8; 256];
        for (i, byte) in value.iter_mut().enumerate() {
            *byte = ((id >> ((i % 8) * 8)) & 0xFF) as u8;
        }
        black_box(value)
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 11),
    (1 << 12),
    (1 << 13),
    (1 << 14),
    (1 << 15),
    (1 << 16),
    (1 << 17),
    (1 << 18),
];

fn random_pairs<W: Workload>(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| {
            let id = rng.try_next_u64().unwrap();
            (W::key(id), W::value(id))
        })
        .collect()
}

fn sequential_pairs<W: Workload>(
    count: usize,
    step: usize,
    offset: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            let id = (i * step + offset) as u64;
            (W::key(id), W::value(id))
        })
        .collect()
}

fn bench_insert_random<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("insert_random_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = random_pairs::<W>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map", *size), |b| {
            b.iter_batched(
                || {
                    let mut pairs = pairs.clone();
                    pairs.shuffle(&mut SmallRng::from_os_rng());
                    pairs
                },
                |pairs| {
                    let mut map = ByteMap::with_buckets(W::VALUE_SIZE, pairs.len());
                    for (key, value) in pairs.iter() {
                        map.put(key, value);
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter_batched(
                || {
                    let mut pairs = pairs.clone();
                    pairs.shuffle(&mut SmallRng::from_os_rng());
                    pairs
                },
                |pairs| {
                    let mut map = hashbrown::HashMap::with_capacity(pairs.len());
                    for (key, value) in pairs.into_iter() {
                        black_box(map.insert(key, value));
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_hit<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_hit_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = sequential_pairs::<W>(*size, 2, 0);

        let mut byte_map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
        let mut hashbrown_map = hashbrown::HashMap::with_capacity(*size);
        for (key, value) in pairs.iter() {
            byte_map.put(key, value);
            hashbrown_map.insert(key.clone(), value.clone());
        }

        let keys: Vec<Vec<u8>> = pairs.into_iter().map(|(key, _)| key).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map", *size), |b| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| {
                    for key in keys.iter() {
                        black_box(byte_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| {
                    for key in keys.iter() {
                        black_box(hashbrown_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_miss<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_miss_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        // Even ids are inserted, odd ids are probed: all lookups miss.
        let pairs = sequential_pairs::<W>(*size, 2, 0);
        let missing: Vec<Vec<u8>> = sequential_pairs::<W>(*size, 2, 1)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let mut byte_map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
        let mut hashbrown_map = hashbrown::HashMap::with_capacity(*size);
        for (key, value) in pairs.iter() {
            byte_map.put(key, value);
            hashbrown_map.insert(key.clone(), value.clone());
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map", *size), |b| {
            b.iter_batched(
                || {
                    let mut missing = missing.clone();
                    missing.shuffle(&mut SmallRng::from_os_rng());
                    missing
                },
                |missing| {
                    for key in missing.iter() {
                        black_box(byte_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter_batched(
                || {
                    let mut missing = missing.clone();
                    missing.shuffle(&mut SmallRng::from_os_rng());
                    missing
                },
                |missing| {
                    for key in missing.iter() {
                        black_box(hashbrown_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_zipf<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_zipf_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    const KEY_SPACE_MULTIPLIER: usize = 2;

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = sequential_pairs::<W>(*size, 1, 0);

        let mut byte_map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
        let mut hashbrown_map = hashbrown::HashMap::with_capacity(*size);
        for (key, value) in pairs.iter() {
            byte_map.put(key, value);
            hashbrown_map.insert(key.clone(), value.clone());
        }

        // Zipf-skewed probes over twice the inserted key space: hot keys hit,
        // the cold tail mostly misses.
        let mut rng = SmallRng::from_os_rng();
        let distr = Zipf::new((*size * KEY_SPACE_MULTIPLIER) as f32 - 1.0, 1.0).unwrap();
        let probes: Vec<Vec<u8>> = (0..*size)
            .map(|_| W::key(rng.sample(distr) as u64))
            .collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map", *size), |b| {
            b.iter(|| {
                for key in probes.iter() {
                    black_box(byte_map.get(key));
                }
            })
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter(|| {
                for key in probes.iter() {
                    black_box(hashbrown_map.get(key));
                }
            })
        });
    }

    group.finish();
}

fn bench_remove<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("remove_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = sequential_pairs::<W>(*size, 1, 0);
        let keys: Vec<Vec<u8>> = pairs.iter().map(|(key, _)| key.clone()).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map", *size), |b| {
            b.iter_batched(
                || {
                    let mut map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
                    for (key, value) in pairs.iter() {
                        map.put(key, value);
                    }
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    (map, keys)
                },
                |(mut map, keys)| {
                    for key in keys.iter() {
                        black_box(map.remove(key));
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter_batched(
                || {
                    let mut map = hashbrown::HashMap::with_capacity(*size);
                    for (key, value) in pairs.iter() {
                        map.insert(key.clone(), value.clone());
                    }
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    (map, keys)
                },
                |(mut map, keys)| {
                    for key in keys.iter() {
                        black_box(map.remove(key));
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_iteration<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("iteration_{}", core::any::type_name::<W>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = sequential_pairs::<W>(*size, 1, 0);

        let mut byte_map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
        let mut hashbrown_map = hashbrown::HashMap::with_capacity(*size);
        for (key, value) in pairs.iter() {
            byte_map.put(key, value);
            hashbrown_map.insert(key.clone(), value.clone());
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("byte_map_iter", *size), |b| {
            b.iter(|| {
                let mut count = 0;
                for entry in byte_map.iter() {
                    black_box(entry);
                    count += 1;
                }
                black_box(count)
            })
        });

        // The stateless protocol re-derives every position by key, so this is
        // the O(chain) step cost made visible next to the cursor iterator.
        group.bench_function(BenchmarkId::new("byte_map_first_next", *size), |b| {
            b.iter(|| {
                let mut count = 0;
                let mut key = byte_map.first();
                while let Some(current) = key {
                    black_box(current);
                    count += 1;
                    key = byte_map.next(current);
                }
                black_box(count)
            })
        });

        group.bench_function(BenchmarkId::new("hashbrown", *size), |b| {
            b.iter(|| {
                let mut count = 0;
                for entry in hashbrown_map.iter() {
                    black_box(entry);
                    count += 1;
                }
                black_box(count)
            })
        });
    }

    group.finish();
}

fn bench_chain_degradation<W: Workload, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "chain_degradation_{}",
        core::any::type_name::<W>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let pairs = sequential_pairs::<W>(*size, 1, 0);

        // Same data, two bucket geometries: the default fixed 1023 buckets
        // versus one bucket per entry.
        let mut default_map = ByteMap::new(W::VALUE_SIZE);
        let mut sized_map = ByteMap::with_buckets(W::VALUE_SIZE, *size);
        for (key, value) in pairs.iter() {
            default_map.put(key, value);
            sized_map.put(key, value);
        }

        let keys: Vec<Vec<u8>> = pairs.into_iter().map(|(key, _)| key).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(BenchmarkId::new("default_buckets", *size), |b| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| {
                    for key in keys.iter() {
                        black_box(default_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("sized_buckets", *size), |b| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| {
                    for key in keys.iter() {
                        black_box(sized_map.get(key));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_random::<ShortKeys, 6>,
    bench_insert_random::<LongKeys, 4>,
    bench_find_hit::<ShortKeys, 6>,
    bench_find_hit::<LongKeys, 4>,
    bench_find_miss::<ShortKeys, 6>,
    bench_find_miss::<LongKeys, 4>,
    bench_find_zipf::<ShortKeys, 6>,
    bench_find_zipf::<LongKeys, 4>,
    bench_remove::<ShortKeys, 6>,
    bench_remove::<LongKeys, 4>,
    bench_iteration::<ShortKeys, 6>,
    bench_iteration::<LongKeys, 4>,
    bench_chain_degradation::<ShortKeys, 4>,
);

criterion_main!(benches);
