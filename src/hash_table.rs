use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::mem;

use log::debug;
use log::trace;

use crate::config;
use crate::config::TableConfig;
use crate::error::Error;
use crate::placement;
use crate::placement::MultiplyShift;
use crate::placement::Placement;

/// Debug statistics for hash table analysis.
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Entries the table holds before its next resize
    pub capacity: usize,
    /// Total number of slots allocated
    pub total_slots: usize,
    /// Fraction of slots occupied
    pub slot_utilization: f64,
    /// Longest probe run any entry needs to be found, in slots
    pub longest_pileup: usize,
    /// Mean probe run over all entries, in slots
    pub mean_pileup: f64,
    /// Bytes used by the slot arrays
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Linear Probing Table Statistics ===");
        println!(
            "Population: {}/{} before resize, {} slots ({:.2}% utilization)",
            self.populated,
            self.capacity,
            self.total_slots,
            self.slot_utilization * 100.0
        );
        println!(
            "Pileup: longest {}, mean {:.3}",
            self.longest_pileup, self.mean_pileup
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// An open-addressing hash table using linear probing.
///
/// `HashTable<K, V, P>` keeps keys, values and full hashes in three parallel
/// arrays sharing one index. The caller supplies the hash and an equality
/// predicate for every operation; the table never hashes anything itself.
///
/// Each hash is mapped to its home slot by the [`Placement`] strategy `P`,
/// which is reseeded on every resize. With the default [`MultiplyShift`], a
/// batch of hashes crafted to collide under one multiplier scatters again
/// once the table grows.
///
/// Deletion closes the gap left behind by shifting later entries of the same
/// probe run backwards, so the table never holds tombstones.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use scatter_hash::hash_table::Entry;
/// # use scatter_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::with_capacity(100);
/// let hash = hash_id(123);
///
/// match table.entry(hash, |id: &u64| *id == 123) {
///     Entry::Vacant(entry) => {
///         entry.insert(123, "Alice".to_string());
///     }
///     Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
///
/// assert_eq!(table.find(hash, |id| *id == 123), Some((&123, &"Alice".to_string())));
/// ```
#[derive(Clone)]
pub struct HashTable<K, V, P = MultiplyShift> {
    keys: Vec<Option<K>>,
    values: Vec<Option<V>>,
    hashes: Vec<u64>,

    len: usize,
    mask: usize,
    shift: u32,
    threshold: usize,
    load_factor: f32,
    max_table_size: usize,

    placement: P,
}

impl<K, V, P> Debug for HashTable<K, V, P>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(Iter::over(&self.keys, &self.values, self.len))
            .finish()
    }
}

impl<K, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_slots<T>(table_size: usize) -> Vec<Option<T>> {
    let mut slots = Vec::with_capacity(table_size);
    slots.resize_with(table_size, || None);
    slots
}

impl<K, V> HashTable<K, V> {
    /// Creates an empty table with the default load factor.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a table that holds at least `capacity` entries before its
    /// first resize.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds `2^30`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<u64, String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// assert!(table.table_size().is_power_of_two());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        match Self::try_with_config(TableConfig::new().capacity(capacity)) {
            Ok(table) => table,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a table from a validated configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// # use scatter_hash::TableConfig;
    /// #
    /// let table: HashTable<u64, ()> =
    ///     HashTable::try_with_config(TableConfig::new().capacity(16).load_factor(0.5)).unwrap();
    /// assert_eq!(table.table_size(), 32);
    /// assert_eq!(table.capacity(), 16);
    ///
    /// assert!(HashTable::<u64, ()>::try_with_config(TableConfig::new().load_factor(2.0)).is_err());
    /// ```
    pub fn try_with_config(config: TableConfig) -> Result<Self, Error> {
        Self::with_placement(config, MultiplyShift::seeded(config.get_seed()))
    }

    /// The multiplier currently used to place hashes.
    pub fn hash_multiplier(&self) -> u64 {
        self.placement.multiplier()
    }

    /// Replaces the placement multiplier and rebuilds the table at its
    /// current size. Even multipliers are made odd.
    ///
    /// Useful when a workload is observed to pile up under the current
    /// multiplier.
    pub fn set_hash_multiplier(&mut self, multiplier: u64) {
        let previous = self.placement.multiplier();
        self.placement = MultiplyShift::with_multiplier(multiplier);
        debug!(
            "hash multiplier replaced: {previous:#018x} -> {:#018x}",
            self.placement.multiplier()
        );
        self.rebuild(self.keys.len());
    }
}

impl<K, V, P> HashTable<K, V, P>
where
    P: Placement,
{
    /// Creates a table from `config` that places hashes with `placement`.
    ///
    /// The configured seed is ignored; `placement` is used as given.
    pub fn with_placement(config: TableConfig, placement: P) -> Result<Self, Error> {
        let table_size = config.table_size()?;
        let load_factor = config.get_load_factor();

        Ok(Self {
            keys: empty_slots(table_size),
            values: empty_slots(table_size),
            hashes: vec![0; table_size],
            len: 0,
            mask: table_size - 1,
            shift: placement::shift_for(table_size),
            threshold: config::threshold(table_size, load_factor),
            load_factor,
            max_table_size: config.get_max_table_size(),
            placement,
        })
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries the table holds before it resizes.
    pub fn capacity(&self) -> usize {
        self.threshold
    }

    /// Number of slots currently allocated. Always a power of two.
    pub fn table_size(&self) -> usize {
        self.keys.len()
    }

    /// The load factor the table grows at.
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// The placement strategy in use.
    pub fn placement(&self) -> &P {
        &self.placement
    }

    #[inline]
    fn home(&self, hash: u64) -> usize {
        self.placement.place(hash, self.shift) & self.mask
    }

    /// Walks the probe run for `hash`, returning `Ok` with the index of the
    /// matching entry or `Err` with the first empty slot.
    #[inline]
    fn probe(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Result<usize, usize> {
        let mut index = self.home(hash);
        loop {
            match &self.keys[index] {
                None => return Err(index),
                Some(key) if self.hashes[index] == hash && eq(key) => return Ok(index),
                Some(_) => index = (index + 1) & self.mask,
            }
        }
    }

    #[inline]
    fn vacant_slot(&self, hash: u64) -> usize {
        let mut index = self.home(hash);
        while self.keys[index].is_some() {
            index = (index + 1) & self.mask;
        }
        index
    }

    /// Finds the entry matching `hash` and `eq`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(4);
    /// table.entry(42, |k: &&str| *k == "answer").or_insert_with(|| ("answer", 42));
    ///
    /// assert_eq!(table.find(42, |k| *k == "answer"), Some((&"answer", &42)));
    /// assert_eq!(table.find(42, |k| *k == "question"), None);
    /// ```
    pub fn find(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(&K, &V)> {
        let index = self.probe(hash, eq).ok()?;
        match (&self.keys[index], &self.values[index]) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => None,
        }
    }

    /// Finds the entry matching `hash` and `eq`, with mutable access to its
    /// value.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(&K, &mut V)> {
        let index = self.probe(hash, eq).ok()?;
        match (&self.keys[index], &mut self.values[index]) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => None,
        }
    }

    /// Gets the entry for `hash` and `eq` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::Entry;
    /// # use scatter_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(4);
    ///
    /// match table.entry(7, |k: &u32| *k == 7) {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert(7, "seven");
    ///     }
    ///     Entry::Occupied(_) => unreachable!(),
    /// }
    ///
    /// match table.entry(7, |k: &u32| *k == 7) {
    ///     Entry::Occupied(entry) => assert_eq!(entry.get(), &"seven"),
    ///     Entry::Vacant(_) => unreachable!(),
    /// }
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Entry<'_, K, V, P> {
        match self.probe(hash, eq) {
            Ok(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Err(index) => Entry::Vacant(VacantEntry {
                table: self,
                hash,
                index,
            }),
        }
    }

    /// Removes the entry matching `hash` and `eq`, closing the gap it leaves
    /// in its probe run.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(4);
    /// table.entry(1, |k: &u8| *k == 1).or_insert_with(|| (1, 'a'));
    ///
    /// assert_eq!(table.remove(1, |k| *k == 1), Some((1, 'a')));
    /// assert_eq!(table.remove(1, |k| *k == 1), None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(K, V)> {
        let index = self.probe(hash, eq).ok()?;
        Some(self.take_at(index))
    }

    fn take_at(&mut self, index: usize) -> (K, V) {
        let (Some(key), Some(value)) = (self.keys[index].take(), self.values[index].take()) else {
            unreachable!("slot {index} is not occupied");
        };
        self.len -= 1;
        self.close_gap(index);
        (key, value)
    }

    /// Backward-shift deletion: every later entry of the run that may legally
    /// sit at `hole` moves into it, and the hole moves on to where it was.
    fn close_gap(&mut self, mut hole: usize) {
        let mut next = (hole + 1) & self.mask;
        while self.keys[next].is_some() {
            let home = self.home(self.hashes[next]);
            if next.wrapping_sub(home) & self.mask > hole.wrapping_sub(home) & self.mask {
                self.keys.swap(hole, next);
                self.values.swap(hole, next);
                self.hashes[hole] = self.hashes[next];
                hole = next;
            }
            next = (next + 1) & self.mask;
        }
    }

    /// Removes every entry. The table keeps its size and placement.
    pub fn clear(&mut self) {
        self.keys.fill_with(|| None);
        self.values.fill_with(|| None);
        self.len = 0;
    }

    /// Reserves room for at least `additional` more entries without resizing.
    ///
    /// # Panics
    ///
    /// Panics with "capacity overflow" if the table would need more slots
    /// than its maximum table size.
    pub fn reserve(&mut self, additional: usize) {
        if self.try_reserve(additional).is_err() {
            config::capacity_overflow();
        }
    }

    /// Like [`reserve`](Self::reserve), but reports overflow instead of
    /// panicking.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// # use scatter_hash::{Error, TableConfig};
    /// #
    /// let config = TableConfig::new().max_table_size(1 << 8);
    /// let mut table: HashTable<u32, u32> = HashTable::try_with_config(config).unwrap();
    ///
    /// assert!(table.try_reserve(100).is_ok());
    /// assert_eq!(table.try_reserve(1000), Err(Error::CapacityOverflow));
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let table_size =
            config::reserve_size(self.len, additional, self.load_factor, self.max_table_size)?;
        if table_size > self.keys.len() {
            self.resize(table_size);
        }
        Ok(())
    }

    /// Shrinks the table to the smallest size that holds its entries.
    pub fn shrink_to_fit(&mut self) {
        let table_size =
            config::table_size_for(self.len, self.load_factor).unwrap_or(self.keys.len());
        if table_size < self.keys.len() {
            self.resize(table_size);
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let table_size = config::doubled(self.keys.len(), self.max_table_size);
        self.resize(table_size);
    }

    fn resize(&mut self, table_size: usize) {
        trace!(
            "resizing linear-probing table: {} -> {table_size} slots, {} entries",
            self.keys.len(),
            self.len
        );
        self.placement.reseed(table_size);
        self.rebuild(table_size);
    }

    /// Reallocates the slot arrays at `table_size` and re-inserts every entry
    /// under the current placement. Keys are known distinct, so no equality
    /// checks are made.
    fn rebuild(&mut self, table_size: usize) {
        let keys = mem::replace(&mut self.keys, empty_slots(table_size));
        let values = mem::replace(&mut self.values, empty_slots(table_size));
        let hashes = mem::replace(&mut self.hashes, vec![0; table_size]);

        self.mask = table_size - 1;
        self.shift = placement::shift_for(table_size);
        self.threshold = config::threshold(table_size, self.load_factor);

        for ((key, value), hash) in keys.into_iter().zip(values).zip(hashes) {
            if let (Some(key), Some(value)) = (key, value) {
                let index = self.vacant_slot(hash);
                self.keys[index] = Some(key);
                self.values[index] = Some(value);
                self.hashes[index] = hash;
            }
        }
    }

    /// Returns a cursor over the table that can remove the entry it is on.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use scatter_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(16);
    /// for k in 0..10u64 {
    ///     table.entry(k, |x: &u64| *x == k).or_insert_with(|| (k, k * 10));
    /// }
    ///
    /// let mut cursor = table.cursor_mut();
    /// while let Some((key, value)) = cursor.move_next() {
    ///     *value += 1;
    ///     if key % 2 == 0 {
    ///         cursor.remove_current().unwrap();
    ///     }
    /// }
    ///
    /// assert_eq!(table.len(), 5);
    /// assert_eq!(table.find(3, |x| *x == 3), Some((&3, &31)));
    /// ```
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, P> {
        // Starting just past an empty slot means no probe run straddles the
        // cursor's start, so gap closing only pulls unvisited entries
        // backwards.
        let start = self
            .keys
            .iter()
            .position(Option::is_none)
            .map_or(0, |empty| (empty + 1) & self.mask);

        CursorMut {
            table: self,
            start,
            offset: 0,
            current: None,
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut cursor = self.cursor_mut();
        while let Some((key, value)) = cursor.move_next() {
            if !f(key, value) {
                let _removed = cursor.remove_current();
            }
        }
    }

    /// Returns an iterator over the entries of the table in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::over(&self.keys, &self.values, self.len)
    }

    /// Returns an iterator with mutable access to every value.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::over(&self.keys, &mut self.values, self.len)
    }

    /// Removes and yields every entry. The table keeps its size.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain::over(&mut self.keys, &mut self.values, &mut self.len)
    }

    /// Number of slots an entry's probe run spans, from its home slot to the
    /// slot it occupies, inclusive.
    #[cfg(any(test, feature = "stats"))]
    fn pileup_at(&self, index: usize) -> usize {
        (index.wrapping_sub(self.home(self.hashes[index])) & self.mask) + 1
    }

    #[cfg(any(test, feature = "stats"))]
    fn pileups(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.is_some())
            .map(|(index, _)| self.pileup_at(index))
    }

    /// The longest probe run any entry in the table needs to be found.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn longest_pileup(&self) -> usize {
        self.pileups().max().unwrap_or(0)
    }

    /// Computes a histogram of probe run lengths.
    ///
    /// Bin `i` counts the entries that sit `i` slots past their home slot.
    /// The histogram is as long as the longest run.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> Vec<usize> {
        let mut hist = Vec::new();
        for pileup in self.pileups() {
            if hist.len() < pileup {
                hist.resize(pileup, 0);
            }
            hist[pileup - 1] += 1;
        }
        hist
    }

    /// Returns utilization and pileup statistics for debugging.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let total_slots = self.keys.len();
        let total_pileup: usize = self.pileups().sum();

        DebugStats {
            populated: self.len,
            capacity: self.threshold,
            total_slots,
            slot_utilization: self.len as f64 / total_slots as f64,
            longest_pileup: self.longest_pileup(),
            mean_pileup: if self.len == 0 {
                0.0
            } else {
                total_pileup as f64 / self.len as f64
            },
            total_bytes: total_slots
                * (mem::size_of::<Option<K>>()
                    + mem::size_of::<Option<V>>()
                    + mem::size_of::<u64>()),
        }
    }

    /// Prints the probe histogram as a horizontal bar chart on stdout.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_probe_histogram(&self) {
        let hist = self.probe_histogram();
        let max = hist.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        const WIDTH: usize = 60;
        println!("probe histogram ({} entries):", self.len);
        for (bin, &count) in hist.iter().enumerate() {
            let bar = "#".repeat((count * WIDTH).div_ceil(max));
            println!("{:>4} | {bar} ({count})", bin + 1);
        }
    }
}

impl<K, V, P> IntoIterator for HashTable<K, V, P> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::over(self.keys, self.values, self.len)
    }
}

impl<'a, K, V, P> IntoIterator for &'a HashTable<K, V, P> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        Iter::over(&self.keys, &self.values, self.len)
    }
}

/// A view into a single entry in the table, which may be vacant or occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, K, V, P = MultiplyShift> {
    /// No entry matched; the key is absent from the table
    Vacant(VacantEntry<'a, K, V, P>),
    /// An entry matched
    Occupied(OccupiedEntry<'a, K, V, P>),
}

impl<'a, K, V, P> Entry<'a, K, V, P>
where
    P: Placement,
{
    /// Inserts the pair produced by `default` if the entry is vacant and
    /// returns a mutable reference to the value.
    pub fn or_insert_with(self, default: impl FnOnce() -> (K, V)) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (key, value) = default();
                entry.insert(key, value)
            }
        }
    }

    /// Runs `f` on an occupied entry's value and returns the entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }
}

/// A view into a vacant slot in a [`HashTable`].
pub struct VacantEntry<'a, K, V, P = MultiplyShift> {
    table: &'a mut HashTable<K, V, P>,
    hash: u64,
    index: usize,
}

impl<'a, K, V, P> VacantEntry<'a, K, V, P>
where
    P: Placement,
{
    /// The hash this entry was looked up with.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Inserts the pair, growing the table first if it is at its threshold,
    /// and returns a mutable reference to the value.
    pub fn insert(self, key: K, value: V) -> &'a mut V {
        let table = self.table;
        let mut index = self.index;
        if table.len + 1 > table.threshold {
            table.grow();
            index = table.vacant_slot(self.hash);
        }

        table.keys[index] = Some(key);
        table.hashes[index] = self.hash;
        table.len += 1;
        table.values[index].insert(value)
    }
}

/// A view into an occupied slot in a [`HashTable`].
pub struct OccupiedEntry<'a, K, V, P = MultiplyShift> {
    table: &'a mut HashTable<K, V, P>,
    index: usize,
}

impl<'a, K, V, P> OccupiedEntry<'a, K, V, P>
where
    P: Placement,
{
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        match &self.table.keys[self.index] {
            Some(key) => key,
            None => unreachable!("occupied entry without a key"),
        }
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        match &self.table.values[self.index] {
            Some(value) => value,
            None => unreachable!("occupied entry without a value"),
        }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        match &mut self.table.values[self.index] {
            Some(value) => value,
            None => unreachable!("occupied entry without a value"),
        }
    }

    /// Converts the entry into a mutable reference to its value.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        match &mut table.values[self.index] {
            Some(value) => value,
            None => unreachable!("occupied entry without a value"),
        }
    }

    /// Swaps the stored key for `key`, which must be equal to it and share
    /// its hash, returning the old key.
    pub fn replace_key(&mut self, key: K) -> K {
        match self.table.keys[self.index].replace(key) {
            Some(old) => old,
            None => unreachable!("occupied entry without a key"),
        }
    }

    /// Removes the entry from the table.
    pub fn remove(self) -> (K, V) {
        self.table.take_at(self.index)
    }
}

/// A cursor over a [`HashTable`] that can remove the entry it is on.
///
/// Removing an entry may shift later entries of its probe run backwards into
/// the freed slot. The cursor revisits that slot, so every entry is yielded
/// exactly once even while the table is being compacted.
///
/// This struct is created by the [`cursor_mut`] method on [`HashTable`].
///
/// [`cursor_mut`]: HashTable::cursor_mut
pub struct CursorMut<'a, K, V, P = MultiplyShift> {
    table: &'a mut HashTable<K, V, P>,
    start: usize,
    offset: usize,
    current: Option<usize>,
}

impl<K, V, P> CursorMut<'_, K, V, P>
where
    P: Placement,
{
    /// Advances to the next entry and returns it.
    pub fn move_next(&mut self) -> Option<(&K, &mut V)> {
        let table_size = self.table.keys.len();
        self.current = None;
        while self.offset < table_size {
            let index = (self.start + self.offset) & self.table.mask;
            self.offset += 1;
            if self.table.keys[index].is_some() {
                self.current = Some(index);
                break;
            }
        }

        let index = self.current?;
        let table = &mut *self.table;
        match (&table.keys[index], &mut table.values[index]) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => None,
        }
    }

    /// Removes the entry the cursor is on.
    ///
    /// Fails with [`Error::NoCurrentEntry`] before the first call to
    /// [`move_next`](Self::move_next), after the cursor is exhausted, or when
    /// the current entry was already removed.
    pub fn remove_current(&mut self) -> Result<(K, V), Error> {
        let index = self.current.take().ok_or(Error::NoCurrentEntry)?;
        // Whatever the gap closing moves into `index` has not been seen yet.
        self.offset -= 1;
        Ok(self.table.take_at(index))
    }
}

/// An iterator over the entries of a [`HashTable`], a
/// [`CuckooMap`](crate::CuckooMap) or an
/// [`IdentityCuckooMap`](crate::IdentityCuckooMap).
pub struct Iter<'a, K, V> {
    keys: core::slice::Iter<'a, Option<K>>,
    values: core::slice::Iter<'a, Option<V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn over(keys: &'a [Option<K>], values: &'a [Option<V>], remaining: usize) -> Self {
        Self {
            keys: keys.iter(),
            values: values.iter(),
            remaining,
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            values: self.values.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            if let (Some(key), Some(value)) = (self.keys.next()?, self.values.next()?) {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a table.
pub struct IterMut<'a, K, V> {
    keys: core::slice::Iter<'a, Option<K>>,
    values: core::slice::IterMut<'a, Option<V>>,
    remaining: usize,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn over(
        keys: &'a [Option<K>],
        values: &'a mut [Option<V>],
        remaining: usize,
    ) -> Self {
        Self {
            keys: keys.iter(),
            values: values.iter_mut(),
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            if let (Some(key), Some(value)) = (self.keys.next()?, self.values.next()?) {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// An owning iterator over the entries of a table.
pub struct IntoIter<K, V> {
    keys: vec::IntoIter<Option<K>>,
    values: vec::IntoIter<Option<V>>,
    remaining: usize,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn over(keys: Vec<Option<K>>, values: Vec<Option<V>>, remaining: usize) -> Self {
        Self {
            keys: keys.into_iter(),
            values: values.into_iter(),
            remaining,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            if let (Some(key), Some(value)) = (self.keys.next()?, self.values.next()?) {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

/// A draining iterator over the entries of a table.
///
/// Dropping it removes whatever was not yet yielded.
pub struct Drain<'a, K, V> {
    keys: &'a mut Vec<Option<K>>,
    values: &'a mut Vec<Option<V>>,
    len: &'a mut usize,
    index: usize,
}

impl<'a, K, V> Drain<'a, K, V> {
    pub(crate) fn over(
        keys: &'a mut Vec<Option<K>>,
        values: &'a mut Vec<Option<V>>,
        len: &'a mut usize,
    ) -> Self {
        Self {
            keys,
            values,
            len,
            index: 0,
        }
    }
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        while *self.len > 0 && self.index < self.keys.len() {
            let index = self.index;
            self.index += 1;
            if let (Some(key), Some(value)) = (self.keys[index].take(), self.values[index].take())
            {
                *self.len -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (*self.len, Some(*self.len))
    }
}

impl<K, V> Drop for Drain<'_, K, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn hash_string_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    fn half_full(capacity: usize) -> HashTable<u64, i32> {
        HashTable::try_with_config(TableConfig::new().capacity(capacity).load_factor(0.5)).unwrap()
    }

    fn insert(table: &mut HashTable<u64, i32>, hash: u64, key: u64, value: i32) {
        match table.entry(hash, |k| *k == key) {
            Entry::Vacant(entry) => {
                entry.insert(key, value);
            }
            Entry::Occupied(_) => panic!("duplicate key {key}"),
        }
    }

    /// Multiplicative inverse modulo 2^64 of an odd number.
    fn inverse(multiplier: u64) -> u64 {
        let mut x = multiplier;
        for _ in 0..5 {
            x = x.wrapping_mul(2u64.wrapping_sub(multiplier.wrapping_mul(x)));
        }
        x
    }

    /// A hash that lands on `home` under the table's current multiplier. The
    /// low bits of `salt` keep hashes distinct without moving the home slot.
    fn hash_for_home(table: &HashTable<u64, i32>, home: usize, salt: u64) -> u64 {
        let product = ((home as u64) << table.shift) | (salt & ((1 << table.shift) - 1));
        inverse(table.hash_multiplier()).wrapping_mul(product)
    }

    #[test]
    fn inverse_is_correct() {
        for m in [1u64, 3, placement::DEFAULT_MULTIPLIER, u64::MAX] {
            assert_eq!(m.wrapping_mul(inverse(m)), 1);
        }
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            insert(&mut table, hash, k, k as i32 * 2);
            assert_eq!(
                table.find(hash, |key| *key == k),
                Some((&k, &(k as i32 * 2))),
                "{:#?}",
                table
            );
        }

        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |key| *key == k), Some((&k, &(k as i32 * 2))));
        }
        assert_eq!(table.find(hash_key(&state, 99), |key| *key == 99), None);
    }

    #[test]
    fn duplicate_entry_is_occupied() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(8);
        let hash = hash_key(&state, 5);
        insert(&mut table, hash, 5, 50);

        match table.entry(hash, |k| *k == 5) {
            Entry::Occupied(entry) => {
                assert_eq!(entry.key(), &5);
                assert_eq!(entry.get(), &50);
            }
            Entry::Vacant(_) => panic!("expected occupied entry"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(8);
        let hash = hash_key(&state, 1);
        insert(&mut table, hash, 1, 10);

        if let Some((_, value)) = table.find_mut(hash, |k| *k == 1) {
            *value = 11;
        }
        assert_eq!(table.find(hash, |k| *k == 1), Some((&1, &11)));

        table.entry(hash, |k| *k == 1).and_modify(|v| *v += 1);
        assert_eq!(table.find(hash, |k| *k == 1), Some((&1, &12)));
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..200u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }

        for k in (0..200u64).step_by(3) {
            let hash = hash_key(&state, k);
            assert_eq!(table.remove(hash, |key| *key == k), Some((k, k as i32)));
            assert_eq!(table.remove(hash, |key| *key == k), None);
        }

        for k in 0..200u64 {
            let found = table.find(hash_key(&state, k), |key| *key == k);
            if k % 3 == 0 {
                assert_eq!(found, None);
            } else {
                assert_eq!(found, Some((&k, &(k as i32))));
            }
        }
        assert_eq!(table.len(), table.iter().count());
    }

    #[test]
    fn remove_closes_gap_in_shared_run() {
        let mut table = half_full(8);
        let hashes: Vec<u64> = (0..5).map(|k| hash_for_home(&table, 3, k)).collect();
        for (k, &hash) in hashes.iter().enumerate() {
            insert(&mut table, hash, k as u64, k as i32);
        }
        assert_eq!(table.longest_pileup(), 5);

        assert_eq!(table.remove(hashes[1], |k| *k == 1), Some((1, 1)));
        assert_eq!(table.longest_pileup(), 4);
        for k in [0u64, 2, 3, 4] {
            assert_eq!(
                table.find(hashes[k as usize], |key| *key == k),
                Some((&k, &(k as i32)))
            );
        }
        // The run is contiguous again: slots 3..7 full, slot 7 empty.
        assert!(table.keys[3..7].iter().all(Option::is_some));
        assert!(table.keys[7].is_none());
    }

    #[test]
    fn remove_leaves_entries_at_their_home() {
        let mut table = half_full(8);
        let a = hash_for_home(&table, 2, 0);
        let b = hash_for_home(&table, 2, 1);
        let c = hash_for_home(&table, 4, 0);
        insert(&mut table, a, 0, 0);
        insert(&mut table, b, 1, 1);
        insert(&mut table, c, 2, 2);
        assert!(table.keys[4] == Some(2));

        table.remove(a, |k| *k == 0);
        // `b` moves back to its home, `c` is already home and must not move.
        assert_eq!(table.keys[2], Some(1));
        assert!(table.keys[3].is_none());
        assert_eq!(table.keys[4], Some(2));
    }

    #[test]
    fn remove_run_wrapping_past_end() {
        let mut table = half_full(8);
        let last = table.table_size() - 1;
        let hashes = [
            hash_for_home(&table, last - 1, 0),
            hash_for_home(&table, last - 1, 1),
            hash_for_home(&table, last - 1, 2),
            hash_for_home(&table, 0, 3),
            hash_for_home(&table, 1, 4),
        ];
        for (k, &hash) in hashes.iter().enumerate() {
            insert(&mut table, hash, k as u64, k as i32);
        }
        assert_eq!(table.keys[0], Some(2));
        assert_eq!(table.keys[2], Some(4));

        table.remove(hashes[0], |k| *k == 0);
        assert_eq!(table.keys[last - 1], Some(1));
        assert_eq!(table.keys[last], Some(2));
        assert_eq!(table.keys[0], Some(3));
        assert_eq!(table.keys[1], Some(4));
        assert!(table.keys[2].is_none());
        for k in 1..5u64 {
            assert!(table.find(hashes[k as usize], |key| *key == k).is_some());
        }
    }

    #[test]
    fn removal_clears_value_slot() {
        let state = HashState::default();
        let mut table: HashTable<u64, String> = HashTable::with_capacity(4);
        let hash = hash_key(&state, 1);
        table
            .entry(hash, |k| *k == 1)
            .or_insert_with(|| (1, "one".to_string()));
        table.remove(hash, |k| *k == 1);

        assert!(table.values.iter().all(Option::is_none));
    }

    #[test]
    fn grows_at_threshold() {
        let state = HashState::default();
        let mut table = half_full(16);
        assert_eq!(table.table_size(), 32);
        let multiplier = table.hash_multiplier();

        for k in 0..16u64 {
            insert(&mut table, hash_key(&state, k), k, 0);
        }
        assert_eq!(table.table_size(), 32);

        insert(&mut table, hash_key(&state, 16), 16, 0);
        assert_eq!(table.table_size(), 64);
        assert_eq!(table.capacity(), 32);
        assert_ne!(table.hash_multiplier(), multiplier);
        assert_eq!(
            table.hash_multiplier(),
            placement::remix(multiplier, 64)
        );

        for k in 0..17u64 {
            assert!(table.find(hash_key(&state, k), |key| *key == k).is_some());
        }
    }

    #[test]
    fn flooded_run_scatters_after_resize() {
        let mut table = half_full(1024);
        assert_eq!(table.table_size(), 2048);

        // Every hash multiplies out to a value below 2^shift, so all of them
        // share home slot 0.
        let inv = inverse(table.hash_multiplier());
        for k in 0..1000u64 {
            insert(&mut table, inv.wrapping_mul(k), k, k as i32);
        }
        assert_eq!(table.longest_pileup(), 1000);

        let mut multiplier = table.hash_multiplier();
        for additional in [1500, 5000] {
            table.reserve(additional);
            assert_ne!(table.hash_multiplier(), multiplier);
            multiplier = table.hash_multiplier();

            let longest = table.longest_pileup();
            assert!(longest < 64, "longest pileup {longest} after resize");
            for k in 0..1000u64 {
                assert_eq!(
                    table.find(inv.wrapping_mul(k), |key| *key == k),
                    Some((&k, &(k as i32)))
                );
            }
        }
    }

    #[test]
    fn set_hash_multiplier_rebuilds_in_place() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(64);
        for k in 0..40u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }
        let table_size = table.table_size();

        table.set_hash_multiplier(0x1234_5678_9ABC_DEF0);
        assert_eq!(table.hash_multiplier(), 0x1234_5678_9ABC_DEF1);
        assert_eq!(table.table_size(), table_size);
        for k in 0..40u64 {
            assert!(table.find(hash_key(&state, k), |key| *key == k).is_some());
        }
    }

    #[test]
    fn seeded_tables_start_from_different_multipliers() {
        let a: HashTable<u64, ()> =
            HashTable::try_with_config(TableConfig::new().seed(1)).unwrap();
        let b: HashTable<u64, ()> =
            HashTable::try_with_config(TableConfig::new().seed(2)).unwrap();
        let c: HashTable<u64, ()> = HashTable::new();

        assert_ne!(a.hash_multiplier(), b.hash_multiplier());
        assert_eq!(c.hash_multiplier(), placement::DEFAULT_MULTIPLIER);
    }

    #[test]
    fn clear_keeps_size_and_multiplier() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..100u64 {
            insert(&mut table, hash_key(&state, k), k, 0);
        }
        let table_size = table.table_size();
        let multiplier = table.hash_multiplier();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.table_size(), table_size);
        assert_eq!(table.hash_multiplier(), multiplier);
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.find(hash_key(&state, 1), |k| *k == 1), None);
    }

    #[test]
    fn cursor_removes_while_compacting() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..500u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }

        let mut seen = Vec::new();
        let mut cursor = table.cursor_mut();
        while let Some((key, value)) = cursor.move_next() {
            seen.push(*key);
            *value = -*value;
            if key % 2 == 1 {
                cursor.remove_current().unwrap();
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
        assert_eq!(table.len(), 250);
        for k in 0..500u64 {
            let found = table.find(hash_key(&state, k), |key| *key == k);
            if k % 2 == 1 {
                assert_eq!(found, None);
            } else {
                assert_eq!(found, Some((&k, &-(k as i32))));
            }
        }
    }

    #[test]
    fn cursor_handles_wrapping_runs() {
        let mut table = half_full(8);
        let last = table.table_size() - 1;
        let homes = [last - 1, last - 1, last - 1, 0, 1, 5];
        let hashes: Vec<u64> = homes
            .iter()
            .enumerate()
            .map(|(k, &home)| hash_for_home(&table, home, k as u64))
            .collect();
        for (k, &hash) in hashes.iter().enumerate() {
            insert(&mut table, hash, k as u64, k as i32);
        }

        let mut seen = Vec::new();
        let mut cursor = table.cursor_mut();
        while let Some((key, _)) = cursor.move_next() {
            let key = *key;
            seen.push(key);
            if key == 1 {
                assert_eq!(cursor.remove_current(), Ok((1, 1)));
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2, 3, 4, 5]);
        assert_eq!(table.len(), 5);
        for k in [0u64, 2, 3, 4, 5] {
            assert!(table.find(hashes[k as usize], |key| *key == k).is_some());
        }
    }

    #[test]
    fn cursor_remove_without_current_fails() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(4);
        insert(&mut table, hash_key(&state, 1), 1, 1);

        let mut cursor = table.cursor_mut();
        assert_eq!(cursor.remove_current(), Err(Error::NoCurrentEntry));
        assert!(cursor.move_next().is_some());
        assert_eq!(cursor.remove_current(), Ok((1, 1)));
        assert_eq!(cursor.remove_current(), Err(Error::NoCurrentEntry));
        assert!(cursor.move_next().is_none());
        assert_eq!(cursor.remove_current(), Err(Error::NoCurrentEntry));
    }

    #[test]
    fn retain_filters_entries() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..100u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }

        table.retain(|k, v| {
            *v += 1;
            k % 10 == 0
        });
        assert_eq!(table.len(), 10);
        assert_eq!(table.find(hash_key(&state, 30), |k| *k == 30), Some((&30, &31)));
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..64u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }

        assert_eq!(table.iter().len(), 64);
        let mut keys: Vec<u64> = table.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..64).collect::<Vec<_>>());

        for (_, v) in table.iter_mut() {
            *v *= 2;
        }
        assert_eq!(table.iter().map(|(_, v)| *v as i64).sum::<i64>(), 2 * (0..64).sum::<i64>());

        let table_size = table.table_size();
        let mut drained: Vec<(u64, i32)> = table.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained.len(), 64);
        assert_eq!(drained[10], (10, 20));
        assert!(table.is_empty());
        assert_eq!(table.table_size(), table_size);
    }

    #[test]
    fn dropped_drain_empties_table() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..20u64 {
            insert(&mut table, hash_key(&state, k), k, 0);
        }

        let mut drain = table.drain();
        drain.next();
        drop(drain);
        assert!(table.is_empty());
        assert!(table.keys.iter().all(Option::is_none));
    }

    #[test]
    fn into_iter_yields_everything() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(0);
        for k in 0..30u64 {
            insert(&mut table, hash_key(&state, k), k, 1);
        }
        let collected: Vec<(u64, i32)> = table.into_iter().collect();
        assert_eq!(collected.len(), 30);
    }

    #[test]
    fn string_keys() {
        let state = HashState::default();
        let mut table: HashTable<String, i32> = HashTable::with_capacity(0);
        let words = ["hello", "world", "rust", "probe", "shift"];
        for (i, word) in words.iter().enumerate() {
            let hash = hash_string_key(&state, word);
            table
                .entry(hash, |k| k == word)
                .or_insert_with(|| (word.to_string(), i as i32));
        }

        for (i, word) in words.iter().enumerate() {
            let hash = hash_string_key(&state, word);
            assert_eq!(table.find(hash, |k| k == word).map(|(_, v)| *v), Some(i as i32));
        }
        let hash = hash_string_key(&state, "rust");
        assert_eq!(
            table.remove(hash, |k| k == "rust"),
            Some(("rust".to_string(), 2))
        );
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut original: HashTable<u64, i32> = HashTable::with_capacity(10);
        for k in 0..5u64 {
            insert(&mut original, hash_key(&state, k), k, k as i32);
        }

        let mut cloned = original.clone();
        assert_eq!(cloned.len(), 5);
        assert_eq!(cloned.hash_multiplier(), original.hash_multiplier());

        let hash = hash_key(&state, 1);
        if let Some((_, v)) = cloned.find_mut(hash, |k| *k == 1) {
            *v = 999;
        }
        assert_eq!(original.find(hash, |k| *k == 1), Some((&1, &1)));
        assert_eq!(cloned.find(hash, |k| *k == 1), Some((&1, &999)));
    }

    #[test]
    fn test_shrink_to_fit() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(1000);
        for k in 0..10u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }
        let before = table.table_size();

        table.shrink_to_fit();
        assert!(table.table_size() < before);
        assert!(table.capacity() >= 10);
        for k in 0..10u64 {
            assert_eq!(
                table.find(hash_key(&state, k), |key| *key == k),
                Some((&k, &(k as i32)))
            );
        }

        table.clear();
        table.shrink_to_fit();
        assert_eq!(table.table_size(), 2);
    }

    #[test]
    fn try_reserve_past_limit_fails() {
        let mut table: HashTable<u64, i32> =
            HashTable::try_with_config(TableConfig::new().max_table_size(64)).unwrap();
        assert_eq!(table.try_reserve(1000), Err(Error::CapacityOverflow));
        assert!(table.try_reserve(10).is_ok());
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn growth_past_limit_panics() {
        let mut table: HashTable<u64, i32> = HashTable::try_with_config(
            TableConfig::new().load_factor(1.0).max_table_size(8),
        )
        .unwrap();
        for k in 0..8u64 {
            insert(&mut table, k, k, 0);
        }
    }

    #[test]
    fn stats_reflect_contents() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(100);
        assert_eq!(table.longest_pileup(), 0);
        assert!(table.probe_histogram().is_empty());

        for k in 0..100u64 {
            insert(&mut table, hash_key(&state, k), k, 0);
        }
        let hist = table.probe_histogram();
        assert_eq!(hist.iter().sum::<usize>(), 100);
        assert_eq!(hist.len(), table.longest_pileup());

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 100);
        assert_eq!(stats.total_slots, table.table_size());
        assert!(stats.mean_pileup >= 1.0);
    }

    /// Keeps the low bits of the hash and counts rebuilds.
    #[derive(Debug)]
    struct LowBits {
        reseeds: usize,
    }

    impl Placement for LowBits {
        fn seeded(_: Option<u64>) -> Self {
            Self { reseeds: 0 }
        }

        fn place(&self, hash: u64, shift: u32) -> usize {
            (hash & (u64::MAX >> shift)) as usize
        }

        fn reseed(&mut self, _: usize) {
            self.reseeds += 1;
        }
    }

    #[test]
    fn custom_placement() {
        let config = TableConfig::new().capacity(4).load_factor(0.5);
        let mut table: HashTable<u64, i32, LowBits> =
            HashTable::with_placement(config, LowBits::seeded(None)).unwrap();
        let initial = table.table_size();

        for k in 0..64u64 {
            match table.entry(k, |key| *key == k) {
                Entry::Vacant(entry) => {
                    entry.insert(k, k as i32);
                }
                Entry::Occupied(_) => panic!("duplicate key {k}"),
            }
        }

        assert_eq!(table.len(), 64);
        assert_eq!(
            table.placement().reseeds,
            (table.table_size() / initial).trailing_zeros() as usize
        );
        // Sequential hashes under the identity placement never collide.
        assert_eq!(table.longest_pileup(), 1);
        for k in 0..64u64 {
            assert_eq!(table.find(k, |key| *key == k), Some((&k, &(k as i32))));
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    #[cfg(feature = "std")]
    fn histogram_output() {
        let state = HashState::default();
        let mut table: HashTable<u64, i32> = HashTable::with_capacity(10000);
        for k in 0..table.capacity() as u64 {
            insert(&mut table, hash_key(&state, k), k, k as i32);
        }

        table.print_probe_histogram();
        table.debug_stats().print();
    }
}
