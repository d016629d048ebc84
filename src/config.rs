//! Construction parameters shared by every table kind.
//!
//! A [`TableConfig`] describes how many entries a table must hold before its
//! first resize, how full it may get, how large it may ever grow, and an
//! optional seed for the pseudorandom parts of placement. Tables validate the
//! configuration once, at construction.

use crate::error::Error;

cfg_if::cfg_if! {
    if #[cfg(feature = "density-fifty")] {
        /// Load factor used when none is configured.
        pub const DEFAULT_LOAD_FACTOR: f32 = 0.5;
    } else if #[cfg(feature = "density-ninety")] {
        /// Load factor used when none is configured.
        pub const DEFAULT_LOAD_FACTOR: f32 = 0.9;
    } else {
        /// Load factor used when none is configured.
        pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
    }
}

/// The largest slot count any table may allocate.
pub const MAX_TABLE_SIZE: usize = 1 << 30;

pub(crate) const MIN_TABLE_SIZE: usize = 2;

/// Validated construction parameters for a table.
///
/// # Examples
///
/// ```rust
/// use scatter_hash::TableConfig;
///
/// let config = TableConfig::new().capacity(16).load_factor(0.5);
/// assert_eq!(config.table_size(), Ok(32));
///
/// assert!(TableConfig::new().load_factor(0.0).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    capacity: usize,
    load_factor: f32,
    max_table_size: usize,
    seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TableConfig {
    /// A configuration with zero initial capacity, the default load factor,
    /// the largest permitted table size, and no seed.
    pub const fn new() -> Self {
        Self {
            capacity: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_table_size: MAX_TABLE_SIZE,
            seed: None,
        }
    }

    /// Sets the number of entries the table holds before its first resize.
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the fraction of slots that may be occupied before the table
    /// grows. Must be in `(0, 1]`.
    pub const fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Caps the slot count the table may grow to. Growing past it panics with
    /// [`Error::CapacityOverflow`]; [`try_reserve`](crate::HashMap::try_reserve)
    /// reports it instead.
    pub const fn max_table_size(mut self, max_table_size: usize) -> Self {
        self.max_table_size = max_table_size;
        self
    }

    /// Seeds the initial hash multipliers and the cuckoo eviction PRNG.
    ///
    /// Without a seed, fixed constants are used and placement is
    /// reproducible across runs.
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The configured load factor.
    pub const fn get_load_factor(&self) -> f32 {
        self.load_factor
    }

    /// The configured maximum table size.
    pub const fn get_max_table_size(&self) -> usize {
        self.max_table_size
    }

    /// The configured seed, if any.
    pub const fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    /// Checks every parameter, rejecting rather than correcting bad values.
    pub fn validate(&self) -> Result<(), Error> {
        self.table_size().map(|_| ())
    }

    /// Validates the configuration and returns the initial slot count.
    pub fn table_size(&self) -> Result<usize, Error> {
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::InvalidLoadFactor(self.load_factor));
        }
        if !self.max_table_size.is_power_of_two()
            || self.max_table_size < MIN_TABLE_SIZE
            || self.max_table_size > MAX_TABLE_SIZE
        {
            return Err(Error::InvalidMaxTableSize(self.max_table_size));
        }
        if self.capacity > MAX_TABLE_SIZE {
            return Err(Error::CapacityTooLarge {
                requested: self.capacity,
                max: MAX_TABLE_SIZE,
            });
        }

        match table_size_for(self.capacity, self.load_factor) {
            Some(size) if size <= self.max_table_size => Ok(size),
            _ => Err(Error::CapacityTooLarge {
                requested: self.capacity,
                max: threshold(self.max_table_size, self.load_factor),
            }),
        }
    }
}

/// Entries a table of `table_size` slots holds before it must grow.
///
/// Always leaves at least one slot empty so linear probes terminate.
#[inline]
pub(crate) fn threshold(table_size: usize, load_factor: f32) -> usize {
    ((table_size as f64 * load_factor as f64) as usize).min(table_size - 1)
}

/// Smallest power-of-two slot count whose threshold covers `capacity`.
pub(crate) fn table_size_for(capacity: usize, load_factor: f32) -> Option<usize> {
    let scaled = capacity as f64 / load_factor as f64;
    let mut wanted = scaled as usize;
    if (wanted as f64) < scaled {
        wanted = wanted.saturating_add(1);
    }

    let mut size = wanted.max(MIN_TABLE_SIZE).checked_next_power_of_two()?;
    while threshold(size, load_factor) < capacity {
        size = size.checked_mul(2)?;
    }
    Some(size)
}

/// Slot count needed to hold `len + additional` entries, if it fits.
pub(crate) fn reserve_size(
    len: usize,
    additional: usize,
    load_factor: f32,
    max_table_size: usize,
) -> Result<usize, Error> {
    let required = len.checked_add(additional).ok_or(Error::CapacityOverflow)?;
    match table_size_for(required, load_factor) {
        Some(size) if size <= max_table_size => Ok(size),
        _ => Err(Error::CapacityOverflow),
    }
}

/// Twice `table_size`, or a capacity-overflow panic past `max_table_size`.
#[inline]
pub(crate) fn doubled(table_size: usize, max_table_size: usize) -> usize {
    match table_size.checked_mul(2) {
        Some(size) if size <= max_table_size => size,
        _ => capacity_overflow(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn capacity_overflow() -> ! {
    panic!("{}", Error::CapacityOverflow)
}
