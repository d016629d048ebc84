//! Multiply-shift placement of hash codes into power-of-two tables.
//!
//! A hash is multiplied by an odd 64-bit constant and the top `log2(size)`
//! bits of the product become the slot index. Multiplication by an odd number
//! is a bijection on `u64`, so no information is lost before the shift, and
//! changing the multiplier reshuffles every key in the table.

use log::trace;

/// Multiplier used by tables constructed without a seed.
pub const DEFAULT_MULTIPLIER: u64 = 0xD1B5_4A32_D192_ED03;

/// Fixed multipliers for the second, third and fourth cuckoo hash functions.
pub const CUCKOO_PRIMES: [u64; 3] = [
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
    0x27D4_EB2F_1656_67C5,
];

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Maps `hash` to a slot index of a table with `2^(64 - shift)` slots.
///
/// `multiplier` must be odd and `shift` must be in `1..=63`.
///
/// ```rust
/// use scatter_hash::placement::{place, shift_for};
///
/// let shift = shift_for(1024);
/// assert_eq!(shift, 54);
/// assert!(place(0xDEAD_BEEF, 0x9E37_79B9_7F4A_7C15, shift) < 1024);
/// ```
#[inline]
pub const fn place(hash: u64, multiplier: u64, shift: u32) -> usize {
    (hash.wrapping_mul(multiplier) >> shift) as usize
}

/// The shift that pairs with a table of `table_size` slots.
///
/// `table_size` must be a power of two of at least 2.
#[inline]
pub const fn shift_for(table_size: usize) -> u32 {
    u64::BITS - table_size.trailing_zeros()
}

#[inline]
const fn finalize(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derives a fresh odd multiplier from the previous one and the new table
/// size.
///
/// The result depends on every bit of both inputs, so two tables that
/// resized through different sizes end up with unrelated multipliers.
#[inline]
pub const fn remix(previous: u64, table_size: usize) -> u64 {
    finalize(previous ^ (table_size as u64).wrapping_mul(GOLDEN_GAMMA)) | 1
}

/// Derives an odd multiplier from a user supplied seed.
#[inline]
pub const fn seeded_multiplier(seed: u64) -> u64 {
    finalize(seed.wrapping_add(GOLDEN_GAMMA)) | 1
}

/// Strategy for mapping hashes to slots in an open-addressing table.
///
/// The table calls [`place`](Placement::place) for every probe start and
/// [`reseed`](Placement::reseed) on every resize, before re-inserting its
/// entries. Implementations must return an index below `2^(64 - shift)`.
pub trait Placement {
    /// Builds the strategy a new table starts with.
    fn seeded(seed: Option<u64>) -> Self
    where
        Self: Sized;

    /// Home slot for `hash`.
    fn place(&self, hash: u64, shift: u32) -> usize;

    /// Called when the table is about to be rebuilt with `table_size` slots.
    fn reseed(&mut self, table_size: usize);
}

/// Multiply-shift placement whose multiplier is remixed on every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultiplyShift {
    multiplier: u64,
}

impl Default for MultiplyShift {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl MultiplyShift {
    /// Placement starting from a multiplier derived from `seed`.
    pub const fn with_seed(seed: u64) -> Self {
        Self {
            multiplier: seeded_multiplier(seed),
        }
    }

    /// Placement using `multiplier`, forced odd.
    pub const fn with_multiplier(multiplier: u64) -> Self {
        Self {
            multiplier: multiplier | 1,
        }
    }

    /// The current multiplier.
    pub const fn multiplier(&self) -> u64 {
        self.multiplier
    }
}

impl Placement for MultiplyShift {
    fn seeded(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::default, Self::with_seed)
    }

    #[inline]
    fn place(&self, hash: u64, shift: u32) -> usize {
        place(hash, self.multiplier, shift)
    }

    fn reseed(&mut self, table_size: usize) {
        let previous = self.multiplier;
        self.multiplier = remix(previous, table_size);
        trace!(
            "placement multiplier {previous:#018x} -> {:#018x} for {table_size} slots",
            self.multiplier
        );
    }
}
