use std::hash::BuildHasher;
use std::hash::Hasher;

use clap::Parser;
use scatter_hash::HashMap;
use scatter_hash::TableConfig;

#[derive(Parser, Debug)]
struct Args {
    /// Number of keys inserted by each run.
    #[arg(short = 'n', long = "count", default_value_t = 2000)]
    count: u64,

    /// Initial capacity of the map. Large enough that the adversarial keys
    /// fit without a resize.
    #[arg(short = 'c', long = "capacity", default_value_t = 4096)]
    capacity: usize,
}

/// Passes `u64` keys through unchanged, so the demo controls hash codes.
#[derive(Default)]
struct PassThrough(u64);

impl Hasher for PassThrough {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.rotate_left(8) ^ u64::from(b);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

#[derive(Clone, Copy, Default)]
struct PassThroughState;

impl BuildHasher for PassThroughState {
    type Hasher = PassThrough;

    fn build_hasher(&self) -> Self::Hasher {
        PassThrough::default()
    }
}

/// Multiplicative inverse of an odd `m` modulo `2^64`.
fn inverse(m: u64) -> u64 {
    let mut inv = m;
    for _ in 0..5 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(m.wrapping_mul(inv)));
    }
    inv
}

fn report(label: &str, map: &HashMap<u64, u64, PassThroughState>) {
    let stats = map.debug_stats();
    println!(
        "{label}: {} entries in {} slots, multiplier {:#018x}",
        stats.populated,
        stats.total_slots,
        map.hash_multiplier()
    );
    println!(
        "  longest pileup {}, mean pileup {:.3}",
        stats.longest_pileup, stats.mean_pileup
    );

    let hist = map.probe_histogram();
    let max = hist.iter().copied().max().unwrap_or(0);
    for (bin, &count) in hist.iter().enumerate().take(12) {
        let bar = "#".repeat((count * 50).div_ceil(max.max(1)));
        println!("  {:>4} | {bar} ({count})", bin + 1);
    }
    if hist.len() > 12 {
        println!("  ... {} more bins", hist.len() - 12);
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = TableConfig::new().capacity(args.capacity);

    let mut benign = HashMap::try_with_config_and_hasher(config, PassThroughState)
        .expect("valid configuration");
    for key in 0..args.count {
        benign.insert(key.wrapping_mul(0x9E37_79B9_7F4A_7C15), key);
    }
    report("benign keys", &benign);

    // Every key j * m^-1 lands on slot 0 under multiplier m, at any size.
    let mut flooded = HashMap::try_with_config_and_hasher(config, PassThroughState)
        .expect("valid configuration");
    let inv = inverse(flooded.hash_multiplier());
    for j in 0..args.count {
        flooded.insert(j.wrapping_mul(inv), j);
    }
    report("crafted keys before resize", &flooded);

    let table_size = flooded.table_size();
    flooded.reserve(table_size);
    report("crafted keys after one resize", &flooded);
}
