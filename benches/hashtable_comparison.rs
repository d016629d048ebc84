use core::hash::BuildHasher;
use core::hash::Hash;
use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use hashbrown::HashMap as HashbrownMap;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;
use scatter_hash::CuckooMap;
use scatter_hash::HashMap as ScatterMap;
use siphasher::sip::SipHasher;

#[derive(Clone, Copy, Default)]
struct SipState;

impl BuildHasher for SipState {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new()
    }
}

trait TestKey: Clone + Hash + Eq {
    fn new(key: u64) -> Self;
}

impl TestKey for u64 {
    fn new(key: u64) -> Self {
        black_box(key)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct StringKey(String);

impl TestKey for StringKey {
    fn new(key: u64) -> Self {
        black_box(Self(format!("key_{key:016X}")))
    }
}

/// The operations every benchmarked map supports.
trait BenchMap<K> {
    fn with_capacity(capacity: usize) -> Self;
    fn insert(&mut self, key: K, value: u64) -> Option<u64>;
    fn get(&self, key: &K) -> Option<&u64>;
    fn remove(&mut self, key: &K) -> Option<u64>;
}

impl<K: Hash + Eq> BenchMap<K> for ScatterMap<K, u64, SipState> {
    fn with_capacity(capacity: usize) -> Self {
        ScatterMap::with_capacity_and_hasher(capacity, SipState)
    }

    fn insert(&mut self, key: K, value: u64) -> Option<u64> {
        ScatterMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&u64> {
        ScatterMap::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<u64> {
        ScatterMap::remove(self, key)
    }
}

impl<K: Hash + Eq> BenchMap<K> for CuckooMap<K, u64, SipState> {
    fn with_capacity(capacity: usize) -> Self {
        CuckooMap::with_capacity_and_hasher(capacity, SipState)
    }

    fn insert(&mut self, key: K, value: u64) -> Option<u64> {
        CuckooMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&u64> {
        CuckooMap::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<u64> {
        CuckooMap::remove(self, key)
    }
}

impl<K: Hash + Eq> BenchMap<K> for HashbrownMap<K, u64, SipState> {
    fn with_capacity(capacity: usize) -> Self {
        HashbrownMap::with_capacity_and_hasher(capacity, SipState)
    }

    fn insert(&mut self, key: K, value: u64) -> Option<u64> {
        HashbrownMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&u64> {
        HashbrownMap::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<u64> {
        HashbrownMap::remove(self, key)
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 12),
    (1 << 14),
    (1 << 16),
    (1 << 18),
];

fn random_keys<K: TestKey>(count: usize) -> Vec<K> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| K::new(rng.try_next_u64().unwrap()))
        .collect()
}

fn filled<K: TestKey, M: BenchMap<K>>(keys: &[K]) -> M {
    let mut map = M::with_capacity(0);
    for (i, key) in keys.iter().enumerate() {
        map.insert(key.clone(), i as u64);
    }
    map
}

macro_rules! for_each_map {
    ($group:expr, $bench:ident, $key:ty, $($args:expr),*) => {
        $bench::<$key, ScatterMap<$key, u64, SipState>>(&mut $group, "linear_probing", $($args),*);
        $bench::<$key, CuckooMap<$key, u64, SipState>>(&mut $group, "cuckoo", $($args),*);
        $bench::<$key, HashbrownMap<$key, u64, SipState>>(&mut $group, "hashbrown", $($args),*);
    };
}

fn insert_one<K: TestKey, M: BenchMap<K>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    keys: &[K],
    preallocate: bool,
) {
    group.bench_function(name, |b| {
        b.iter_batched(
            || {
                let mut keys = keys.to_vec();
                keys.shuffle(&mut SmallRng::from_os_rng());
                keys
            },
            |keys| {
                let mut map = M::with_capacity(if preallocate { keys.len() } else { 0 });
                for (i, key) in keys.into_iter().enumerate() {
                    black_box(map.insert(key, i as u64));
                }
                black_box(map)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert<K: TestKey>(c: &mut Criterion, preallocate: bool) {
    let mut group = c.benchmark_group(format!(
        "insert{}_{}",
        if preallocate { "_preallocated" } else { "" },
        core::any::type_name::<K>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES {
        let keys = random_keys::<K>(size);
        group.throughput(Throughput::Elements(size as u64));
        for_each_map!(group, insert_one, K, &keys, preallocate);
    }
    group.finish();
}

fn bench_insert_random<K: TestKey>(c: &mut Criterion) {
    bench_insert::<K>(c, false);
}

fn bench_insert_preallocated<K: TestKey>(c: &mut Criterion) {
    bench_insert::<K>(c, true);
}

fn lookup_one<K: TestKey, M: BenchMap<K>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    present: &[K],
    probes: &[K],
) {
    let map: M = filled(present);
    group.bench_function(name, |b| {
        b.iter(|| {
            let mut found = 0usize;
            for key in probes {
                found += usize::from(map.get(key).is_some());
            }
            black_box(found)
        })
    });
}

fn bench_lookup<K: TestKey>(c: &mut Criterion) {
    for (label, hit) in [("hit", true), ("miss", false)] {
        let mut group = c.benchmark_group(format!(
            "lookup_{label}_{}",
            core::any::type_name::<K>()
        ));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        for &size in SIZES {
            let present = random_keys::<K>(size);
            let mut probes = if hit {
                present.clone()
            } else {
                random_keys::<K>(size)
            };
            probes.shuffle(&mut SmallRng::from_os_rng());

            group.throughput(Throughput::Elements(size as u64));
            for_each_map!(group, lookup_one, K, &present, &probes);
        }
        group.finish();
    }
}

fn remove_one<K: TestKey, M: BenchMap<K>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    keys: &[K],
) {
    group.bench_function(name, |b| {
        b.iter_batched(
            || {
                let mut order = keys.to_vec();
                order.shuffle(&mut SmallRng::from_os_rng());
                (filled::<K, M>(keys), order)
            },
            |(mut map, order)| {
                for key in &order {
                    black_box(map.remove(key));
                }
                black_box(map)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_remove<K: TestKey>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("remove_{}", core::any::type_name::<K>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES {
        let keys = random_keys::<K>(size);
        group.throughput(Throughput::Elements(size as u64));
        for_each_map!(group, remove_one, K, &keys);
    }
    group.finish();
}

#[derive(Clone, Copy)]
enum Operation {
    Insert(u64),
    Remove(u64),
    Find(u64),
}

fn mixed_one<K: TestKey, M: BenchMap<K>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    operations: &[Operation],
) {
    group.bench_function(name, |b| {
        b.iter(|| {
            let mut map = M::with_capacity(0);
            for operation in operations {
                match *operation {
                    Operation::Insert(key) => {
                        black_box(map.insert(K::new(key), key));
                    }
                    Operation::Remove(key) => {
                        black_box(map.remove(&K::new(key)));
                    }
                    Operation::Find(key) => {
                        black_box(map.get(&K::new(key)));
                    }
                }
            }
            black_box(map)
        })
    });
}

fn bench_mixed_zipf<K: TestKey>(c: &mut Criterion) {
    for exponent in [1.0, 1.3] {
        let mut group = c.benchmark_group(format!(
            "mixed_zipf_{exponent:.01}_{}",
            core::any::type_name::<K>()
        ));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        for &size in SIZES {
            let mut rng = SmallRng::from_os_rng();
            let op_distr = Zipf::new(3.0, exponent).unwrap();
            let key_distr = Zipf::new(size as f64 * 2.0, 1.0).unwrap();

            let operations = (0..size * 3)
                .map(|_| {
                    let op: f64 = rng.sample(op_distr);
                    let key = rng.sample(key_distr) as u64;
                    if op <= 1.0 {
                        Operation::Find(key)
                    } else if op <= 2.0 {
                        Operation::Insert(key)
                    } else {
                        Operation::Remove(key)
                    }
                })
                .collect::<Vec<Operation>>();

            group.throughput(Throughput::Elements(operations.len() as u64));
            for_each_map!(group, mixed_one, K, &operations);
        }
        group.finish();
    }
}

criterion_group!(
    benches,
    bench_insert_random::<u64>,
    bench_insert_random::<StringKey>,
    bench_insert_preallocated::<u64>,
    bench_lookup::<u64>,
    bench_lookup::<StringKey>,
    bench_remove::<u64>,
    bench_mixed_zipf::<u64>,
    bench_mixed_zipf::<StringKey>,
);

criterion_main!(benches);
