//! Cuckoo hashing with three or four candidate slots per key and a stash.
//!
//! Every key may live in one of three slots (four once the table reaches
//! `2^16` slots): the low bits of its hash, and three multiply-shift
//! placements under fixed odd constants. Lookups therefore touch at most four
//! slots plus the stash, a short overflow area scanned linearly.
//!
//! Inserting into a key whose candidates are all taken starts a random walk:
//! the occupant of one candidate is evicted, the new key takes its place, and
//! the evicted key tries its own candidates. A key still homeless after a
//! bounded number of steps, growing with the square root of the table size,
//! goes to the stash.
//!
//! Unlike [`HashMap`](crate::HashMap), the candidate functions never change.
//! Keys with identical hashes all compete for the same slots and pile into
//! the stash, so adversarial input is better served by the linear-probing
//! map.

use alloc::vec;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::marker::PhantomData;
use core::mem;

use log::debug;
use log::trace;

use crate::DefaultHashBuilder;
use crate::config;
use crate::config::TableConfig;
use crate::error::Error;
use crate::hash_table::IntoIter;
use crate::hash_table::Iter;
use crate::hash_table::IterMut;
use crate::placement;
use crate::placement::CUCKOO_PRIMES;
use crate::placement::DEFAULT_MULTIPLIER;

/// Slot count from which a fourth candidate slot is used.
const BIG_TABLE: usize = 1 << 16;

const LCG_MULTIPLIER: u64 = 0xD134_2543_DE82_EF95;

/// What the map does when a key can be placed neither by eviction nor in the
/// stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StashGrowth {
    /// Double the table when the main slots carry at least half the
    /// threshold; otherwise make the stash longer. Sets of keys sharing one
    /// hash are held without doubling forever.
    #[default]
    Adaptive,
    /// Always double the table. A large enough set of equal-hash keys grows
    /// the table until it overflows.
    Doubling,
}

/// Stash slots for a table of `table_size` slots: `max(3, 2 * ceil(ln n))`.
fn stash_capacity_for(table_size: usize) -> usize {
    let log2 = table_size.trailing_zeros() as usize;
    // ln 2 to six places, rounded up.
    let ln = (log2 * 693_147).div_ceil(1_000_000);
    (2 * ln).max(3)
}

/// Eviction steps before a key goes to the stash.
fn push_iterations_for(table_size: usize) -> usize {
    table_size.min(8).max(table_size.isqrt() / 8)
}

/// A hash map using cuckoo hashing with an overflow stash.
///
/// Keys, values and hashes live in parallel arrays. The first
/// [`table_size`](Self::table_size) slots form the main table; the rest are
/// the stash.
///
/// ## Example
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use scatter_hash::CuckooMap;
///
/// let mut map: CuckooMap<&str, i32> = CuckooMap::new();
/// map.insert("ferris", 3);
/// map.insert("corro", 5);
///
/// assert_eq!(map.get("ferris"), Some(&3));
/// assert_eq!(map.insert("corro", 6), Some(5));
/// assert_eq!(map.remove("ferris"), Some(3));
/// assert_eq!(map.len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct CuckooMap<K, V, S = DefaultHashBuilder> {
    keys: Vec<Option<K>>,
    values: Vec<Option<V>>,
    hashes: Vec<u64>,

    len: usize,
    table_size: usize,
    mask: usize,
    shift: u32,
    threshold: usize,
    load_factor: f32,
    max_table_size: usize,

    stash_len: usize,
    stash_capacity: usize,
    push_iterations: usize,
    big_table: bool,
    stash_growth: StashGrowth,
    rng: u64,

    hash_builder: S,
}

impl<K, V, S> Debug for CuckooMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn empty_slots<T>(count: usize) -> Vec<Option<T>> {
    let mut slots = Vec::with_capacity(count);
    slots.resize_with(count, || None);
    slots
}

impl<K, V, S> CuckooMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a map that holds at least `capacity` entries before resizing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds `2^30`.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        match Self::try_with_config_and_hasher(TableConfig::new().capacity(capacity), hash_builder)
        {
            Ok(map) => map,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a map from a configuration, rejecting invalid parameters.
    ///
    /// The configured seed, if any, seeds the eviction walk.
    pub fn try_with_config_and_hasher(config: TableConfig, hash_builder: S) -> Result<Self, Error> {
        let table_size = config.table_size()?;
        let stash_capacity = stash_capacity_for(table_size);
        let slots = table_size + stash_capacity;

        Ok(Self {
            keys: empty_slots(slots),
            values: empty_slots(slots),
            hashes: vec![0; slots],
            len: 0,
            table_size,
            mask: table_size - 1,
            shift: placement::shift_for(table_size),
            threshold: config::threshold(table_size, config.get_load_factor()),
            load_factor: config.get_load_factor(),
            max_table_size: config.get_max_table_size(),
            stash_len: 0,
            stash_capacity,
            push_iterations: push_iterations_for(table_size),
            big_table: table_size >= BIG_TABLE,
            stash_growth: StashGrowth::default(),
            rng: config
                .get_seed()
                .map_or(DEFAULT_MULTIPLIER, placement::seeded_multiplier),
            hash_builder,
        })
    }

    /// Sets the policy applied when the stash is full.
    ///
    /// ```rust
    /// use scatter_hash::{CuckooMap, StashGrowth};
    /// use std::hash::RandomState;
    ///
    /// let map: CuckooMap<u32, u32, _> =
    ///     CuckooMap::with_hasher(RandomState::new()).with_stash_growth(StashGrowth::Doubling);
    /// assert_eq!(map.stash_growth(), StashGrowth::Doubling);
    /// ```
    pub fn with_stash_growth(mut self, stash_growth: StashGrowth) -> Self {
        self.stash_growth = stash_growth;
        self
    }

    /// The policy applied when the stash is full.
    pub fn stash_growth(&self) -> StashGrowth {
        self.stash_growth
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries the map holds before its next resize.
    pub fn capacity(&self) -> usize {
        self.threshold
    }

    /// Number of slots in the main table, excluding the stash.
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    #[inline]
    fn choices(&self) -> usize {
        if self.big_table { 4 } else { 3 }
    }

    #[inline]
    fn candidates(&self, hash: u64) -> [usize; 4] {
        [
            hash as usize & self.mask,
            placement::place(hash, CUCKOO_PRIMES[0], self.shift),
            placement::place(hash, CUCKOO_PRIMES[1], self.shift),
            placement::place(hash, CUCKOO_PRIMES[2], self.shift),
        ]
    }

    /// Picks one of `choices` uniformly from the instance's LCG.
    #[inline]
    fn next_choice(&mut self, choices: usize) -> usize {
        self.rng = self.rng.wrapping_mul(LCG_MULTIPLIER).wrapping_add(1);
        (((self.rng >> 32) * choices as u64) >> 32) as usize
    }

    fn find_index(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<usize> {
        let candidates = self.candidates(hash);
        let stash = self.table_size..self.table_size + self.stash_len;
        candidates[..self.choices()]
            .iter()
            .copied()
            .chain(stash)
            .find(|&index| self.hashes[index] == hash && self.keys[index].as_ref().is_some_and(&eq))
    }

    /// Returns a reference to the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        let index = self.find_index(hash, |k| key.eq(k.borrow()))?;
        match (&self.keys[index], &self.values[index]) {
            (Some(k), Some(v)) => Some((k, v)),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        let index = self.find_index(hash, |k| key.eq(k.borrow()))?;
        self.values[index].as_mut()
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns `true` if any entry holds `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Inserts a key-value pair, returning the previous value for `key`.
    ///
    /// # Panics
    ///
    /// Panics with "capacity overflow" if placing the key requires growing
    /// past the maximum table size.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_builder.hash_one(&key);
        if let Some(index) = self.find_index(hash, |k| k == &key) {
            return self.values[index].replace(value);
        }

        if self.len >= self.threshold {
            self.grow();
        }
        self.insert_unique(hash, key, value);
        None
    }

    /// Places a key known to be absent, growing or extending the stash until
    /// it fits.
    fn insert_unique(&mut self, hash: u64, key: K, value: V) {
        let mut homeless = (hash, key, value);
        loop {
            let (hash, key, value) = homeless;
            homeless = match self.place_or_push(hash, key, value) {
                None => break,
                Some(entry) => entry,
            };

            if self.stash_len < self.stash_capacity {
                let (hash, key, value) = homeless;
                let index = self.table_size + self.stash_len;
                self.store(index, hash, key, value);
                self.stash_len += 1;
                break;
            }
            self.make_room();
        }
        self.len += 1;
    }

    /// Stores the entry in an empty candidate slot or evicts its way to one.
    /// Returns the entry left without a slot when the walk gives up.
    fn place_or_push(&mut self, hash: u64, key: K, value: V) -> Option<(u64, K, V)> {
        let candidates = self.candidates(hash);
        match candidates[..self.choices()]
            .iter()
            .find(|&&index| self.keys[index].is_none())
        {
            Some(&index) => {
                self.store(index, hash, key, value);
                None
            }
            None => self.push(hash, key, value),
        }
    }

    fn push(&mut self, hash: u64, key: K, value: V) -> Option<(u64, K, V)> {
        let choices = self.choices();
        let mut held = (hash, key, value);
        for _ in 0..self.push_iterations {
            let (hash, key, value) = held;
            let pick = self.candidates(hash)[self.next_choice(choices)];
            held = self.swap_at(pick, hash, key, value);

            let candidates = self.candidates(held.0);
            if let Some(&index) = candidates[..choices]
                .iter()
                .find(|&&index| self.keys[index].is_none())
            {
                let (hash, key, value) = held;
                self.store(index, hash, key, value);
                return None;
            }
        }
        Some(held)
    }

    #[inline]
    fn store(&mut self, index: usize, hash: u64, key: K, value: V) {
        self.keys[index] = Some(key);
        self.values[index] = Some(value);
        self.hashes[index] = hash;
    }

    /// Puts the entry at the occupied `index` and returns the one evicted.
    fn swap_at(&mut self, index: usize, hash: u64, key: K, value: V) -> (u64, K, V) {
        let (Some(evicted_key), Some(evicted_value)) =
            (self.keys[index].replace(key), self.values[index].replace(value))
        else {
            unreachable!("slot {index} is not occupied");
        };
        let evicted_hash = mem::replace(&mut self.hashes[index], hash);
        (evicted_hash, evicted_key, evicted_value)
    }

    /// Called with a full stash and an entry that fits nowhere.
    #[cold]
    fn make_room(&mut self) {
        let main_len = self.len - self.stash_len;
        match self.stash_growth {
            StashGrowth::Adaptive if main_len * 2 < self.threshold => self.extend_stash(),
            _ => {
                debug!(
                    "cuckoo stash full at {} slots ({} entries, {} stashed), growing",
                    self.table_size, self.len, self.stash_len
                );
                self.grow();
            }
        }
    }

    fn extend_stash(&mut self) {
        let step = stash_capacity_for(self.table_size);
        self.stash_capacity += step;
        let slots = self.table_size + self.stash_capacity;
        self.keys.resize_with(slots, || None);
        self.values.resize_with(slots, || None);
        self.hashes.resize(slots, 0);
        trace!(
            "cuckoo stash extended to {} slots at table size {}",
            self.stash_capacity, self.table_size
        );
    }

    /// Removes `key` from the map, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` from the map, returning the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        let index = self.find_index(hash, |k| key.eq(k.borrow()))?;
        Some(self.take_at(index))
    }

    /// Empties `index`. A stash hole is filled with the last stash entry.
    fn take_at(&mut self, index: usize) -> (K, V) {
        let (Some(key), Some(value)) = (self.keys[index].take(), self.values[index].take()) else {
            unreachable!("slot {index} is not occupied");
        };
        self.len -= 1;

        if index >= self.table_size {
            self.stash_len -= 1;
            let last = self.table_size + self.stash_len;
            if index != last {
                self.keys.swap(index, last);
                self.values.swap(index, last);
                self.hashes[index] = self.hashes[last];
            }
        }
        (key, value)
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut index = 0;
        while index < self.table_size + self.stash_len {
            let keep = match (&self.keys[index], &mut self.values[index]) {
                (Some(key), Some(value)) => f(key, value),
                _ => true,
            };
            if keep {
                index += 1;
            } else {
                let _removed = self.take_at(index);
                // A stash removal pulls an unvisited entry into `index`.
                if index < self.table_size {
                    index += 1;
                }
            }
        }
    }

    /// Removes every entry. The map keeps its table and stash sizes.
    pub fn clear(&mut self) {
        self.keys.fill_with(|| None);
        self.values.fill_with(|| None);
        self.len = 0;
        self.stash_len = 0;
    }

    /// Reserves room for at least `additional` more entries.
    ///
    /// # Panics
    ///
    /// Panics with "capacity overflow" past the maximum table size.
    pub fn reserve(&mut self, additional: usize) {
        if self.try_reserve(additional).is_err() {
            config::capacity_overflow();
        }
    }

    /// Like [`reserve`](Self::reserve), but reports overflow instead of
    /// panicking.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let table_size =
            config::reserve_size(self.len, additional, self.load_factor, self.max_table_size)?;
        if table_size > self.table_size {
            self.resize(table_size);
        }
        Ok(())
    }

    /// Shrinks the table to the smallest size that holds its entries.
    pub fn shrink_to_fit(&mut self) {
        let table_size =
            config::table_size_for(self.len, self.load_factor).unwrap_or(self.table_size);
        if table_size < self.table_size {
            self.resize(table_size);
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let table_size = config::doubled(self.table_size, self.max_table_size);
        self.resize(table_size);
    }

    /// Reallocates at `table_size` slots and re-inserts every entry. A
    /// re-insertion that overflows the new stash grows the table again.
    fn resize(&mut self, table_size: usize) {
        trace!(
            "resizing cuckoo table: {} -> {table_size} slots, {} entries ({} stashed)",
            self.table_size, self.len, self.stash_len
        );

        let stash_capacity = stash_capacity_for(table_size);
        let slots = table_size + stash_capacity;
        let keys = mem::replace(&mut self.keys, empty_slots(slots));
        let values = mem::replace(&mut self.values, empty_slots(slots));
        let hashes = mem::replace(&mut self.hashes, vec![0; slots]);

        self.table_size = table_size;
        self.mask = table_size - 1;
        self.shift = placement::shift_for(table_size);
        self.threshold = config::threshold(table_size, self.load_factor);
        self.stash_capacity = stash_capacity;
        self.push_iterations = push_iterations_for(table_size);
        self.big_table = table_size >= BIG_TABLE;
        self.stash_len = 0;
        self.len = 0;

        for ((key, value), hash) in keys.into_iter().zip(values).zip(hashes) {
            if let (Some(key), Some(value)) = (key, value) {
                self.insert_unique(hash, key, value);
            }
        }
    }
}

impl<K, V, S> CuckooMap<K, V, S> {
    /// Returns an iterator over the entries, main table first, then stash.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::over(&self.keys, &self.values, self.len)
    }

    /// Returns an iterator with mutable access to every value.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::over(&self.keys, &mut self.values, self.len)
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Removes and yields every entry. The map keeps its table and stash
    /// sizes.
    ///
    /// The map is empty as soon as this returns, whether or not the
    /// iterator is consumed.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        let slots = self.keys.len();
        let keys = mem::replace(&mut self.keys, empty_slots(slots));
        let values = mem::replace(&mut self.values, empty_slots(slots));
        let remaining = mem::take(&mut self.len);
        self.stash_len = 0;
        Drain {
            inner: IntoIter::over(keys, values, remaining),
            marker: PhantomData,
        }
    }

    /// Number of entries in the stash.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn stash_len(&self) -> usize {
        self.stash_len
    }

    /// Number of stash slots currently allocated.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn stash_capacity(&self) -> usize {
        self.stash_capacity
    }

    /// Eviction steps tried before an entry goes to the stash.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn push_iterations(&self) -> usize {
        self.push_iterations
    }

    /// Whether keys have four candidate slots rather than three.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn is_big_table(&self) -> bool {
        self.big_table
    }
}

impl<K, V, S> CuckooMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates an empty map using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a map that holds at least `capacity` entries before resizing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }

    /// Creates a map from a configuration using the default hasher builder.
    pub fn try_with_config(config: TableConfig) -> Result<Self, Error> {
        Self::try_with_config_and_hasher(config, S::default())
    }
}

impl<K, V, S> Default for CuckooMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> FromIterator<(K, V)> for CuckooMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for CuckooMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> IntoIterator for CuckooMap<K, V, S> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::over(self.keys, self.values, self.len)
    }
}

impl<'a, K, V, S> IntoIterator for &'a CuckooMap<K, V, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A draining iterator over the entries of a [`CuckooMap`].
pub struct Drain<'a, K, V> {
    inner: IntoIter<K, V>,
    marker: PhantomData<&'a mut (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}
