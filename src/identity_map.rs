//! A two-choice cuckoo map keyed by pointer identity.
//!
//! Keys are references or owning pointers (see [`StableAddress`]); two keys
//! are the same key exactly when they point at the same address. The key's own `Hash` and `Eq` are
//! never called. Keys whose targets share an address, such as empty
//! `String`s or boxes of zero-sized types, are therefore one key.
//!
//! Each address has an odd slot and an even slot, placed by two independent
//! multiply-shift functions, so the two choices never land on the same slot
//! and an eviction chain alternates between odd and even slots. When a chain
//! runs out of steps the map first retries with fresh multipliers at the same
//! size, then doubles until every entry fits.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
#[cfg(target_has_atomic = "ptr")]
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::Deref;

use log::debug;
use log::trace;

use crate::config;
use crate::config::TableConfig;
use crate::error::Error;
use crate::hash_table::Drain;
use crate::hash_table::IntoIter;
use crate::hash_table::Iter;
use crate::hash_table::IterMut;
use crate::placement;
use crate::placement::DEFAULT_MULTIPLIER;

/// Load factor of maps built without a [`TableConfig`].
pub const IDENTITY_LOAD_FACTOR: f32 = 0.5;

mod sealed {
    pub trait Sealed {}
}

/// Pointers whose target stays at the same address when the pointer itself
/// is moved.
///
/// Implemented for references and owning heap pointers. Wrappers such as
/// `ManuallyDrop<T>` deref into their own storage, which moves with them,
/// and cannot be used as identity keys.
pub trait StableAddress: Deref + sealed::Sealed {}

impl<T: ?Sized> sealed::Sealed for &T {}
impl<T: ?Sized> StableAddress for &T {}

impl<T: ?Sized> sealed::Sealed for &mut T {}
impl<T: ?Sized> StableAddress for &mut T {}

impl<T: ?Sized> sealed::Sealed for Box<T> {}
impl<T: ?Sized> StableAddress for Box<T> {}

impl<T: ?Sized> sealed::Sealed for Rc<T> {}
impl<T: ?Sized> StableAddress for Rc<T> {}

#[cfg(target_has_atomic = "ptr")]
impl<T: ?Sized> sealed::Sealed for Arc<T> {}
#[cfg(target_has_atomic = "ptr")]
impl<T: ?Sized> StableAddress for Arc<T> {}

impl sealed::Sealed for String {}
impl StableAddress for String {}

impl<T> sealed::Sealed for Vec<T> {}
impl<T> StableAddress for Vec<T> {}

#[inline]
fn address_of<T: ?Sized>(target: &T) -> u64 {
    (target as *const T).cast::<()>().addr() as u64
}

/// Eviction steps per insert, and rehash attempts per size, for a table of
/// `table_size` slots.
#[inline]
fn threshold_loop_for(table_size: usize) -> usize {
    table_size.trailing_zeros() as usize + 4
}

/// A hash map keyed by the address its keys point at.
///
/// ## Example
///
/// ```rust
/// use std::rc::Rc;
///
/// use scatter_hash::IdentityCuckooMap;
///
/// let a: Rc<str> = Rc::from("node");
/// let b: Rc<str> = Rc::from("node");
///
/// let mut map = IdentityCuckooMap::new();
/// map.insert(Rc::clone(&a), 1);
/// map.insert(Rc::clone(&b), 2);
///
/// // Equal contents, different allocations.
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get(&*a), Some(&1));
/// assert_eq!(map.get(&*b), Some(&2));
/// ```
#[derive(Clone)]
pub struct IdentityCuckooMap<K, V> {
    keys: Vec<Option<K>>,
    values: Vec<Option<V>>,

    len: usize,
    shift: u32,
    threshold: usize,
    threshold_loop: usize,
    load_factor: f32,
    max_table_size: usize,

    odd_multiplier: u64,
    even_multiplier: u64,
}

impl<K, V> Debug for IdentityCuckooMap<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Default for IdentityCuckooMap<K, V>
where
    K: StableAddress,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> IdentityCuckooMap<K, V>
where
    K: StableAddress,
{
    /// Creates an empty map with a load factor of one half.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a map that holds at least `capacity` entries before resizing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds `2^30`.
    pub fn with_capacity(capacity: usize) -> Self {
        let config = TableConfig::new()
            .capacity(capacity)
            .load_factor(IDENTITY_LOAD_FACTOR);
        match Self::try_with_config(config) {
            Ok(map) => map,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a map from a configuration, rejecting invalid parameters.
    ///
    /// The configured load factor is used as given; loads above one half
    /// make rehashing frequent.
    pub fn try_with_config(config: TableConfig) -> Result<Self, Error> {
        let table_size = config.table_size()?;
        let odd_multiplier = config
            .get_seed()
            .map_or(DEFAULT_MULTIPLIER, placement::seeded_multiplier);

        let mut map = Self {
            keys: Vec::new(),
            values: Vec::new(),
            len: 0,
            shift: 0,
            threshold: 0,
            threshold_loop: 0,
            load_factor: config.get_load_factor(),
            max_table_size: config.get_max_table_size(),
            odd_multiplier,
            even_multiplier: placement::remix(odd_multiplier, table_size),
        };
        map.reset_slots(table_size);
        Ok(map)
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

    /// Number of slots currently allocated.
    pub fn table_size(&self) -> usize {
        self.keys.len()
    }

    /// The multipliers placing addresses into odd and even slots.
    pub fn hash_multipliers(&self) -> (u64, u64) {
        (self.odd_multiplier, self.even_multiplier)
    }

    /// Replaces both placement multipliers, forced odd, and re-inserts every
    /// entry. If the entries do not fit under them, the map moves on to fresh
    /// multipliers as it would after a failed insert.
    pub fn set_hash_multipliers(&mut self, odd_multiplier: u64, even_multiplier: u64) {
        debug!(
            "identity multipliers replaced: ({:#018x}, {:#018x}) -> ({odd_multiplier:#018x}, {even_multiplier:#018x})",
            self.odd_multiplier, self.even_multiplier
        );
        self.odd_multiplier = odd_multiplier | 1;
        self.even_multiplier = even_multiplier | 1;

        let table_size = self.table_size();
        let entries = self.take_entries();
        if let Err(entries) = self.try_fill(table_size, entries) {
            self.relocate(entries, table_size);
        }
    }

    #[inline]
    fn odd_slot(&self, address: u64) -> usize {
        placement::place(address, self.odd_multiplier, self.shift) | 1
    }

    #[inline]
    fn even_slot(&self, address: u64) -> usize {
        placement::place(address, self.even_multiplier, self.shift) & !1
    }

    fn find_index(&self, address: u64) -> Option<usize> {
        [self.odd_slot(address), self.even_slot(address)]
            .into_iter()
            .find(|&index| {
                self.keys[index]
                    .as_ref()
                    .is_some_and(|key| address_of(&**key) == address)
            })
    }

    /// Returns a reference to the value for the key pointing at `target`.
    pub fn get(&self, target: &K::Target) -> Option<&V> {
        let index = self.find_index(address_of(target))?;
        self.values[index].as_ref()
    }

    /// Returns the stored key and value for the key pointing at `target`.
    pub fn get_key_value(&self, target: &K::Target) -> Option<(&K, &V)> {
        let index = self.find_index(address_of(target))?;
        match (&self.keys[index], &self.values[index]) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value for the key pointing at
    /// `target`.
    pub fn get_mut(&mut self, target: &K::Target) -> Option<&mut V> {
        let index = self.find_index(address_of(target))?;
        self.values[index].as_mut()
    }

    /// Returns `true` if some key points at `target`.
    pub fn contains_key(&self, target: &K::Target) -> bool {
        self.find_index(address_of(target)).is_some()
    }

    /// Returns `true` if any entry holds `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Inserts a key-value pair, returning the previous value for the key's
    /// address. An existing key is kept and the new one dropped.
    ///
    /// # Panics
    ///
    /// Panics with "capacity overflow" if the entries only fit in a table
    /// larger than the maximum table size.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(index) = self.find_index(address_of(&*key)) {
            return self.values[index].replace(value);
        }

        if self.len >= self.threshold {
            let table_size = config::doubled(self.table_size(), self.max_table_size);
            let mut entries = self.take_entries();
            entries.push((key, value));
            self.relocate(entries, table_size);
        } else if let Err(homeless) = self.put_safe(key, value) {
            let table_size = self.table_size();
            let mut entries = self.take_entries();
            entries.push(homeless);
            self.relocate(entries, table_size);
        }
        None
    }

    /// Places a key known to be absent. A fresh key evicts from its odd
    /// slot; each evicted key then evicts from the slot of the other parity.
    /// Returns the entry left holding when the chain runs out of steps.
    ///
    /// Evicting from the odd slot on every step does not work: the evicted
    /// key's odd slot is often the one it was just pushed out of, so it would
    /// displace the newcomer again and the chain would only swap two keys.
    fn put_safe(&mut self, key: K, value: V) -> Result<(), (K, V)> {
        let mut held = (key, value);
        let mut evict_odd = true;
        for _ in 0..self.threshold_loop {
            let address = address_of(&*held.0);
            let odd = self.odd_slot(address);
            let even = self.even_slot(address);

            let target = if self.keys[odd].is_none() {
                Some(odd)
            } else if self.keys[even].is_none() {
                Some(even)
            } else {
                None
            };
            if let Some(index) = target {
                let (key, value) = held;
                self.keys[index] = Some(key);
                self.values[index] = Some(value);
                self.len += 1;
                return Ok(());
            }

            // The key evicted here sat in its slot of this parity, so its
            // next move is to the other one.
            let index = if evict_odd { odd } else { even };
            let (key, value) = held;
            held = self.swap_at(index, key, value);
            evict_odd = !evict_odd;
        }
        Err(held)
    }

    fn swap_at(&mut self, index: usize, key: K, value: V) -> (K, V) {
        let (Some(evicted_key), Some(evicted_value)) =
            (self.keys[index].replace(key), self.values[index].replace(value))
        else {
            unreachable!("slot {index} is not occupied");
        };
        (evicted_key, evicted_value)
    }

    /// Empties every slot, returning the entries.
    fn take_entries(&mut self) -> Vec<(K, V)> {
        let mut entries = Vec::with_capacity(self.len + 1);
        for (key, value) in self.keys.iter_mut().zip(self.values.iter_mut()) {
            if let (Some(key), Some(value)) = (key.take(), value.take()) {
                entries.push((key, value));
            }
        }
        self.len = 0;
        entries
    }

    fn reset_slots(&mut self, table_size: usize) {
        self.keys.clear();
        self.keys.resize_with(table_size, || None);
        self.values.clear();
        self.values.resize_with(table_size, || None);
        self.len = 0;
        self.shift = placement::shift_for(table_size);
        self.threshold = config::threshold(table_size, self.load_factor);
        self.threshold_loop = threshold_loop_for(table_size);
    }

    /// Inserts every entry into fresh slots at `table_size` under the current
    /// multipliers. On failure the slots are emptied again and every entry is
    /// handed back.
    fn try_fill(&mut self, table_size: usize, entries: Vec<(K, V)>) -> Result<(), Vec<(K, V)>> {
        self.reset_slots(table_size);
        let mut entries = entries.into_iter();
        while let Some((key, value)) = entries.next() {
            if let Err(homeless) = self.put_safe(key, value) {
                let mut all = self.take_entries();
                all.push(homeless);
                all.extend(entries);
                return Err(all);
            }
        }
        Ok(())
    }

    fn remix(&mut self, table_size: usize) {
        self.odd_multiplier = placement::remix(self.even_multiplier, table_size);
        self.even_multiplier = placement::remix(self.odd_multiplier, table_size);
    }

    /// Rehashes `entries` at `table_size` with fresh multipliers, then keeps
    /// doubling until they all fit.
    fn relocate(&mut self, entries: Vec<(K, V)>, table_size: usize) {
        let mut entries = entries;
        for attempt in 0..threshold_loop_for(table_size) {
            self.remix(table_size);
            trace!(
                "identity rehash attempt {attempt} at {table_size} slots, {} entries",
                entries.len()
            );
            match self.try_fill(table_size, entries) {
                Ok(()) => return,
                Err(back) => entries = back,
            }
        }

        debug!(
            "identity rehash exhausted at {table_size} slots with {} entries, growing",
            entries.len()
        );
        let mut table_size = table_size;
        loop {
            table_size = config::doubled(table_size, self.max_table_size);
            self.remix(table_size);
            match self.try_fill(table_size, entries) {
                Ok(()) => return,
                Err(back) => entries = back,
            }
        }
    }

    /// Removes the key pointing at `target`, returning its value.
    pub fn remove(&mut self, target: &K::Target) -> Option<V> {
        self.remove_entry(target).map(|(_, value)| value)
    }

    /// Removes the key pointing at `target`, returning the key and value.
    pub fn remove_entry(&mut self, target: &K::Target) -> Option<(K, V)> {
        let index = self.find_index(address_of(target))?;
        let (Some(key), Some(value)) = (self.keys[index].take(), self.values[index].take()) else {
            unreachable!("slot {index} is not occupied");
        };
        self.len -= 1;
        Some((key, value))
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        for (key, value) in self.keys.iter_mut().zip(self.values.iter_mut()) {
            let keep = match (&*key, &mut *value) {
                (Some(k), Some(v)) => f(k, v),
                _ => true,
            };
            if !keep {
                *key = None;
                *value = None;
                self.len -= 1;
            }
        }
    }

    /// Removes every entry. The map keeps its size and multipliers.
    pub fn clear(&mut self) {
        self.keys.fill_with(|| None);
        self.values.fill_with(|| None);
        self.len = 0;
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
        if table_size > self.table_size() {
            let entries = self.take_entries();
            self.relocate(entries, table_size);
        }
        Ok(())
    }

    /// Shrinks the table to the smallest size that holds its entries.
    pub fn shrink_to_fit(&mut self) {
        let table_size =
            config::table_size_for(self.len, self.load_factor).unwrap_or(self.table_size());
        if table_size < self.table_size() {
            let entries = self.take_entries();
            self.relocate(entries, table_size);
        }
    }

    /// Removes and yields every entry. The map keeps its size.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain::over(&mut self.keys, &mut self.values, &mut self.len)
    }
}

impl<K, V> IdentityCuckooMap<K, V> {
    /// Returns an iterator over the entries in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::over(&self.keys, &self.values, self.len)
    }

    /// Returns an iterator with mutable access to every value.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::over(&self.keys, &mut self.values, self.len)
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, value)| value)
    }
}

impl<K, V> FromIterator<(K, V)> for IdentityCuckooMap<K, V>
where
    K: StableAddress,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V> Extend<(K, V)> for IdentityCuckooMap<K, V>
where
    K: StableAddress,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> IntoIterator for IdentityCuckooMap<K, V> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::over(self.keys, self.values, self.len)
    }
}

impl<'a, K, V> IntoIterator for &'a IdentityCuckooMap<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
