#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;

/// Errors reported by table construction, reservation and cursors.
pub mod error;

/// A HashMap implementation using linear probing.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// A hash set implementation using linear probing.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers.
pub mod hash_set;

/// The raw linear-probing table underneath [`HashMap`] and [`HashSet`].
pub mod hash_table;

/// A cuckoo hash map with three or four hash functions and an overflow
/// stash.
pub mod cuckoo_map;

/// A two-choice cuckoo hash map keyed by pointer identity.
pub mod identity_map;

pub mod placement;

pub use config::DEFAULT_LOAD_FACTOR;
pub use config::MAX_TABLE_SIZE;
pub use config::TableConfig;
pub use cuckoo_map::CuckooMap;
pub use cuckoo_map::StashGrowth;
pub use error::Error;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::HashTable;
pub use identity_map::IdentityCuckooMap;
pub use identity_map::StableAddress;
pub use placement::MultiplyShift;
pub use placement::Placement;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher builder when neither `foldhash` nor `std` is
        /// enabled. It cannot be constructed, so a hasher must be supplied
        /// explicitly.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}

        impl core::hash::BuildHasher for DefaultHashBuilder {
            type Hasher = Self;

            fn build_hasher(&self) -> Self::Hasher {
                match *self {}
            }
        }

        impl core::hash::Hasher for DefaultHashBuilder {
            fn finish(&self) -> u64 {
                match *self {}
            }

            fn write(&mut self, _bytes: &[u8]) {
                match *self {}
            }
        }
    }
}
